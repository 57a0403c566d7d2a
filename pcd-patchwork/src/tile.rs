use std::fmt;

use serde::{Deserialize, Serialize};

use pcd_core::pointcloud::point::{BoundingVolume, Point, PointCloud};

use crate::error::PatchworkError;

/// Top-left (north-west) corner of a square tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileOrigin {
    pub x: f64,
    pub y: f64,
}

impl TileOrigin {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Edges included.
    pub fn contains(&self, x: f64, y: f64, tile_size: f64) -> bool {
        x >= self.x && x <= self.x + tile_size && y <= self.y && y >= self.y - tile_size
    }

    /// Integer coordinates used in tile file names, e.g. `(673, 6362)`.
    pub fn tile_coordinates(&self, factor: f64) -> (i64, i64) {
        ((self.x / factor).trunc() as i64, (self.y / factor).trunc() as i64)
    }
}

impl fmt::Display for TileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

pub fn resolve_tile_origin(points: &[Point], tile_size: f64) -> Result<TileOrigin, PatchworkError> {
    let bounds = BoundingVolume::from_points(points).ok_or(PatchworkError::EmptyInput(None))?;
    tile_origin_from_bounds(&bounds, tile_size)
}

/// Same as [`resolve_tile_origin`], from the bounds recorded when the cloud was built.
/// An empty cloud is reported with the file it was read from.
pub fn point_cloud_tile_origin(
    cloud: &PointCloud,
    tile_size: f64,
) -> Result<TileOrigin, PatchworkError> {
    let bounds = cloud
        .metadata
        .bounding_volume
        .as_ref()
        .ok_or_else(|| PatchworkError::EmptyInput(cloud.metadata.path.clone()))?;
    tile_origin_from_bounds(bounds, tile_size)
}

/// The tile holding every point inside `bounds`. Points on the east and south
/// edges still belong to the tile.
pub fn tile_origin_from_bounds(
    bounds: &BoundingVolume,
    tile_size: f64,
) -> Result<TileOrigin, PatchworkError> {
    let [x_min, y_min, _] = bounds.min;
    let [x_max, y_max, _] = bounds.max;

    let span_x = x_max / tile_size - (x_min / tile_size).floor();
    let span_y = (y_max / tile_size).ceil() - y_min / tile_size;

    if span_x <= 1.0 && span_y <= 1.0 {
        Ok(TileOrigin {
            x: (x_min / tile_size).floor() * tile_size,
            y: (y_max / tile_size).ceil() * tile_size,
        })
    } else {
        Err(PatchworkError::TileSpan {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn points(coordinates: &[(f64, f64)]) -> Vec<Point> {
        coordinates
            .iter()
            .map(|(x, y)| Point::new(*x, *y, 0.0, 2))
            .collect()
    }

    #[test]
    fn test_tile_origin() {
        let origin = resolve_tile_origin(&points(&[(1100.0, 2200.0), (1500.0, 2800.0)]), 1000.0);
        assert_eq!(origin.unwrap(), TileOrigin::new(1000.0, 3000.0));

        let origin = resolve_tile_origin(&points(&[(1500.0, 2300.0)]), 1000.0);
        assert_eq!(origin.unwrap(), TileOrigin::new(1000.0, 3000.0));
    }

    #[test]
    fn test_tile_origin_on_edges() {
        let origin = resolve_tile_origin(&points(&[(1000.0, 1000.0), (2000.0, 2000.0)]), 1000.0);
        assert_eq!(origin.unwrap(), TileOrigin::new(1000.0, 2000.0));
    }

    #[test]
    fn test_tile_origin_errors() {
        assert!(matches!(
            resolve_tile_origin(&[], 1000.0),
            Err(PatchworkError::EmptyInput(None))
        ));

        let result = resolve_tile_origin(&points(&[(1100.0, 2200.0), (1500.0, 3800.0)]), 1000.0);
        match result {
            Err(PatchworkError::TileSpan { y_min, y_max, .. }) => {
                assert_eq!(y_min, 2200.0);
                assert_eq!(y_max, 3800.0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_origin_bounds_the_points() {
        let coordinates = [(1234.5, 6789.0), (1999.9, 6001.2), (1000.0, 6500.0)];
        let origin = resolve_tile_origin(&points(&coordinates), 1000.0).unwrap();
        for (x, y) in coordinates {
            assert!(origin.contains(x, y, 1000.0));
        }
        assert!(!origin.contains(2000.1, 6500.0, 1000.0));
    }

    #[test]
    fn test_point_cloud_tile_origin() {
        let cloud = PointCloud::new(points(&[(1100.0, 2200.0), (1500.0, 2800.0)]), Vec::new());
        assert_eq!(
            point_cloud_tile_origin(&cloud, 1000.0).unwrap(),
            TileOrigin::new(1000.0, 3000.0)
        );

        let empty = PointCloud::new(Vec::new(), Vec::new()).with_path("empty.las".into());
        match point_cloud_tile_origin(&empty, 1000.0) {
            Err(PatchworkError::EmptyInput(Some(path))) => assert_eq!(path, Path::new("empty.las")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tile_coordinates() {
        let origin = TileOrigin::new(673_000.0, 6_362_000.0);
        assert_eq!(origin.tile_coordinates(1000.0), (673, 6362));
    }
}
