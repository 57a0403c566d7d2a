use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use pcd_exporter::geotiff::EpsgCode;

use crate::{error::PatchworkError, patch::grid_size_for, translation::column_type_for_size};

/// How a donor is checked against the recipient tile before its points are selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonorAlignment {
    /// The donor must resolve to the recipient's tile.
    #[default]
    Verify,
    /// Donor points outside the recipient tile are dropped.
    Crop,
}

/// Maps paths recorded on another machine to the local file system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountPoint {
    pub original_path: String,
    pub mounted_path: PathBuf,
    #[serde(default)]
    pub original_platform_is_windows: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchworkConfig {
    pub tile_size: f64,
    pub patch_size: f64,
    pub donor_class_list: Vec<u8>,
    pub recipient_class_list: Vec<u8>,
    pub donor_use_synthetic_points: bool,
    pub recipient_use_synthetic_points: bool,
    pub virtual_class_translation: BTreeMap<u8, u8>,
    /// When set, added points are tagged through this column instead of
    /// having their classification translated.
    pub new_column: Option<String>,
    pub new_column_size: u32,
    pub value_added_points: i64,
    pub crs_epsg: Option<EpsgCode>,
    pub donor_alignment: DonorAlignment,
    pub tile_coordinate_factor: f64,
    pub mount_points: Vec<MountPoint>,
}

impl Default for PatchworkConfig {
    fn default() -> Self {
        Self {
            tile_size: 1000.0,
            patch_size: 1.0,
            donor_class_list: vec![2, 9],
            recipient_class_list: vec![2, 3, 9, 17],
            donor_use_synthetic_points: true,
            recipient_use_synthetic_points: true,
            virtual_class_translation: BTreeMap::from([(2, 69), (9, 70)]),
            new_column: None,
            new_column_size: 8,
            value_added_points: 1,
            crs_epsg: Some(2154),
            donor_alignment: DonorAlignment::Verify,
            tile_coordinate_factor: 1000.0,
            mount_points: Vec::new(),
        }
    }
}

impl PatchworkConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, PatchworkError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PatchworkError> {
        grid_size_for(self.tile_size, self.patch_size)?;
        if !(self.tile_coordinate_factor.is_finite() && self.tile_coordinate_factor > 0.0) {
            return Err(PatchworkError::InvalidConfig(format!(
                "tile_coordinate_factor must be positive, got {}",
                self.tile_coordinate_factor
            )));
        }

        if let Some(name) = &self.new_column {
            if name.is_empty() || name.len() > 32 {
                return Err(PatchworkError::InvalidConfig(format!(
                    "new_column '{}' must hold 1 to 32 bytes",
                    name
                )));
            }
            column_type_for_size(self.new_column_size)?;
            let bits = self.new_column_size;
            let max = if bits == 64 {
                i64::MAX
            } else {
                (1i64 << (bits - 1)) - 1
            };
            if self.value_added_points < -max - 1 || self.value_added_points > max {
                return Err(PatchworkError::InvalidConfig(format!(
                    "value_added_points {} does not fit in {} bits",
                    self.value_added_points, bits
                )));
            }
        }
        Ok(())
    }
}
