use std::path::{Path, PathBuf};

use las::Reader;
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use pcd_core::pointcloud::point::{BoundingVolume, Point, PointCloud};

use super::Parser;
use crate::{error::LasError, layout::DimensionLayout};

pub struct LasParser {
    pub filename: PathBuf,
}

impl LasParser {
    pub fn new(filename: &Path) -> Self {
        Self {
            filename: filename.to_path_buf(),
        }
    }

    /// Bounds recorded in the header, `None` for a file without points.
    pub fn bounds(&self) -> Result<Option<BoundingVolume>, LasError> {
        let reader = Reader::from_path(&self.filename)?;
        let header = reader.header();
        if header.number_of_points() == 0 {
            return Ok(None);
        }
        let bounds = header.bounds();
        Ok(Some(BoundingVolume {
            min: [bounds.min.x, bounds.min.y, bounds.min.z],
            max: [bounds.max.x, bounds.max.y, bounds.max.z],
        }))
    }
}

impl Parser for LasParser {
    fn parse(&self) -> Result<PointCloud, LasError> {
        let start = std::time::Instant::now();
        let mut reader = Reader::from_path(&self.filename)?;
        let layout = DimensionLayout::from_header(reader.header())?;

        let las_points = reader.points().collect::<Result<Vec<las::Point>, _>>()?;
        log::debug!(
            "read {} points from {:?} in {:?}",
            las_points.len(),
            self.filename,
            start.elapsed()
        );

        let points = las_points
            .par_iter()
            .map(|las_point| layout.to_point(las_point))
            .collect::<Result<Vec<Point>, LasError>>()?;

        Ok(PointCloud::new(points, layout.attribute_names()).with_path(self.filename.clone()))
    }
}
