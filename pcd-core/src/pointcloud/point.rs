use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const X: &str = "x";
pub const Y: &str = "y";
pub const Z: &str = "z";
pub const CLASSIFICATION: &str = "classification";
pub const SYNTHETIC: &str = "synthetic";

/// Fields every point carries, in the order they are reported by [`PointCloud::field_names`].
pub const CORE_FIELDS: [&str; 5] = [X, Y, Z, CLASSIFICATION, SYNTHETIC];

// `attributes` is aligned with `PointCloud::attribute_names`.
// Every value is stored as f64 regardless of its on-disk type.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub classification: u8,
    pub synthetic: bool,
    pub attributes: Vec<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64, classification: u8) -> Self {
        Self {
            x,
            y,
            z,
            classification,
            synthetic: false,
            attributes: Vec::new(),
        }
    }
}

/// Resolved position of a named field inside a [`Point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    Z,
    Classification,
    Synthetic,
    Attribute(usize),
}

impl Field {
    pub fn read(&self, point: &Point) -> f64 {
        match self {
            Field::X => point.x,
            Field::Y => point.y,
            Field::Z => point.z,
            Field::Classification => point.classification as f64,
            Field::Synthetic => {
                if point.synthetic {
                    1.0
                } else {
                    0.0
                }
            }
            Field::Attribute(index) => point.attributes.get(*index).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<Point>,
    pub attribute_names: Vec<String>,
    pub metadata: Metadata,
}

impl PointCloud {
    pub fn new(points: Vec<Point>, attribute_names: Vec<String>) -> Self {
        let bounding_volume = BoundingVolume::from_points(&points);
        let metadata = Metadata {
            point_count: points.len(),
            bounding_volume,
            path: None,
        };

        PointCloud {
            points,
            attribute_names,
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Every field name, lower case: the core fields first, then the attributes.
    pub fn field_names(&self) -> Vec<String> {
        CORE_FIELDS
            .iter()
            .map(|name| name.to_string())
            .chain(self.attribute_names.iter().cloned())
            .collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        let name = name.to_lowercase();
        match name.as_str() {
            X => Some(Field::X),
            Y => Some(Field::Y),
            Z => Some(Field::Z),
            CLASSIFICATION => Some(Field::Classification),
            SYNTHETIC => Some(Field::Synthetic),
            _ => self
                .attribute_names
                .iter()
                .position(|attribute| attribute.eq_ignore_ascii_case(&name))
                .map(Field::Attribute),
        }
    }

    pub fn value(&self, point: &Point, name: &str) -> Option<f64> {
        self.field(name).map(|field| field.read(point))
    }

    /// Records the file the points were read from.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.metadata.path = Some(path);
        self
    }

    /// Keeps the points matching `predicate`, with the same attribute layout and source path.
    pub fn filtered<F>(&self, predicate: F) -> PointCloud
    where
        F: Fn(&Point) -> bool,
    {
        let points = self
            .points
            .iter()
            .filter(|point| predicate(point))
            .cloned()
            .collect();
        let mut cloud = PointCloud::new(points, self.attribute_names.clone());
        cloud.metadata.path = self.metadata.path.clone();
        cloud
    }
}

// Min and max of the real (scaled) coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingVolume {
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut bounding_volume = BoundingVolume {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        };
        for point in points {
            bounding_volume.max[0] = bounding_volume.max[0].max(point.x);
            bounding_volume.max[1] = bounding_volume.max[1].max(point.y);
            bounding_volume.max[2] = bounding_volume.max[2].max(point.z);
            bounding_volume.min[0] = bounding_volume.min[0].min(point.x);
            bounding_volume.min[1] = bounding_volume.min[1].min(point.y);
            bounding_volume.min[2] = bounding_volume.min[2].min(point.z);
        }

        Some(bounding_volume)
    }
}

// Computed when the cloud is built, not kept in sync with later edits of `points`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub point_count: usize,
    pub bounding_volume: Option<BoundingVolume>,
    /// File the points were read from, `None` for clouds built in memory.
    pub path: Option<PathBuf>,
}
