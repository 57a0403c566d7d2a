use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use serde::Serialize;

use pcd_core::pointcloud::point::PointCloud;
use pcd_exporter::las::{copy_file, write_merged_las, WriteSummary};
use pcd_parser::parsers::read_point_cloud;

use crate::{
    config::PatchworkConfig,
    error::PatchworkError,
    occupancy::{build_occupancy_grid, OccupancyGrid},
    resolver::resolve_complementary_points,
    tile::{point_cloud_tile_origin, TileOrigin},
    translation::{provenance_dimension, translate_classifications},
};

/// Summary of one merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub recipient: PathBuf,
    pub donors: Vec<PathBuf>,
    pub output: PathBuf,
    /// `None` when the recipient has no point and no donor was given.
    pub tile_origin: Option<TileOrigin>,
    pub recipient_points: usize,
    pub added_points: usize,
    /// Records in the output file.
    pub output_points: u64,
    pub new_column: Option<String>,
    #[serde(skip)]
    pub occupancy: Option<OccupancyGrid>,
}

impl MergeOutcome {
    pub fn occupied_patches(&self) -> usize {
        self.occupancy
            .as_ref()
            .map(OccupancyGrid::occupied_count)
            .unwrap_or(0)
    }
}

/// Writes the recipient followed by the donor points that fill its empty patches.
///
/// Without donors the recipient is copied as is, unless a provenance column
/// has to be declared. Nothing is written when any check fails.
pub fn merge_and_write(
    recipient_path: &Path,
    donor_paths: &[PathBuf],
    output_path: &Path,
    config: &PatchworkConfig,
) -> Result<MergeOutcome, PatchworkError> {
    config.validate()?;
    let start = Instant::now();

    let recipient = read_point_cloud(recipient_path)?;
    log::info!(
        "recipient {:?}: {} points",
        recipient_path,
        recipient.len()
    );

    let new_dimension = provenance_dimension(config)?;
    if let Some(dimension) = &new_dimension {
        if recipient.has_field(&dimension.name) {
            return Err(PatchworkError::DuplicateColumn {
                name: dimension.name.clone(),
                path: recipient_path.to_path_buf(),
            });
        }
    }

    let mut outcome = MergeOutcome {
        recipient: recipient_path.to_path_buf(),
        donors: donor_paths.to_vec(),
        output: output_path.to_path_buf(),
        tile_origin: None,
        recipient_points: recipient.len(),
        added_points: 0,
        output_points: recipient.len() as u64,
        new_column: new_dimension.as_ref().map(|dimension| dimension.name.clone()),
        occupancy: None,
    };

    if donor_paths.is_empty() {
        log::info!("no donor for {:?}", recipient_path);
        if let Some(dimension) = &new_dimension {
            let summary = write_merged_las(
                recipient_path,
                output_path,
                &PointCloud::default(),
                Some(dimension),
            )?;
            outcome.output_points = summary.total();
        } else {
            copy_file(recipient_path, output_path)?;
        }
        if let Ok(origin) = point_cloud_tile_origin(&recipient, config.tile_size) {
            outcome.tile_origin = Some(origin);
            outcome.occupancy = Some(build_occupancy_grid(
                &[],
                origin,
                config.patch_size,
                config.tile_size,
            )?);
        }
        log::info!("copied {:?} in {:?}", output_path, start.elapsed());
        return Ok(outcome);
    }

    let mut donors = Vec::with_capacity(donor_paths.len());
    for donor_path in donor_paths {
        let donor = read_point_cloud(donor_path)?;
        log::info!("donor {:?}: {} points", donor_path, donor.len());
        donors.push(donor);
    }

    let origin = point_cloud_tile_origin(&recipient, config.tile_size)?;
    let mut table = resolve_complementary_points(&recipient, &donors, config)?;
    if new_dimension.is_none() {
        translate_classifications(&mut table, &config.virtual_class_translation)?;
    }
    let complementary = table.to_point_cloud()?;
    log::info!(
        "{} complementary points found in {:?}",
        complementary.len(),
        start.elapsed()
    );

    let summary = if complementary.is_empty() && new_dimension.is_none() {
        copy_file(recipient_path, output_path)?;
        WriteSummary {
            recipient_points: recipient.len() as u64,
            appended_points: 0,
        }
    } else {
        write_merged_las(
            recipient_path,
            output_path,
            &complementary,
            new_dimension.as_ref(),
        )?
    };
    outcome.output_points = summary.total();

    outcome.tile_origin = Some(origin);
    outcome.added_points = complementary.len();
    outcome.occupancy = Some(build_occupancy_grid(
        &complementary.points,
        origin,
        config.patch_size,
        config.tile_size,
    )?);
    log::info!("merged {:?} in {:?}", output_path, start.elapsed());
    Ok(outcome)
}
