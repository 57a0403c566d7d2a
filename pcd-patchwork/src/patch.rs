use serde::Serialize;

use crate::{config::PatchworkConfig, error::PatchworkError, tile::TileOrigin};

pub const PATCH_X: &str = "patch_x";
pub const PATCH_Y: &str = "patch_y";

/// Largest number of patches along a tile side, one byte per cell in memory.
pub const MAX_GRID_SIZE: u32 = 20_000;

/// Column and row of a patch inside its tile, row 0 being the northernmost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PatchCoord {
    pub x: u32,
    pub y: u32,
}

impl PatchCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchGrid {
    pub origin: TileOrigin,
    pub patch_size: f64,
    pub grid_size: u32,
}

/// Number of patches along one side of a tile. Both sizes must be positive and
/// `patch_size` must divide `tile_size`.
pub fn grid_size_for(tile_size: f64, patch_size: f64) -> Result<u32, PatchworkError> {
    if !(tile_size.is_finite() && tile_size > 0.0) {
        return Err(PatchworkError::InvalidConfig(format!(
            "tile_size must be positive, got {}",
            tile_size
        )));
    }
    if !(patch_size.is_finite() && patch_size > 0.0) {
        return Err(PatchworkError::InvalidConfig(format!(
            "patch_size must be positive, got {}",
            patch_size
        )));
    }

    let ratio = tile_size / patch_size;
    let grid_size = ratio.round();
    if grid_size < 1.0 || (ratio - grid_size).abs() > 1e-9 {
        return Err(PatchworkError::InvalidConfig(format!(
            "patch_size {} does not divide tile_size {}",
            patch_size, tile_size
        )));
    }
    if grid_size > MAX_GRID_SIZE as f64 {
        return Err(PatchworkError::InvalidConfig(format!(
            "{} patches per tile side, at most {} are supported",
            grid_size, MAX_GRID_SIZE
        )));
    }
    Ok(grid_size as u32)
}

impl PatchGrid {
    pub fn new(origin: TileOrigin, tile_size: f64, patch_size: f64) -> Result<Self, PatchworkError> {
        Ok(Self {
            origin,
            patch_size,
            grid_size: grid_size_for(tile_size, patch_size)?,
        })
    }

    pub fn from_config(origin: TileOrigin, config: &PatchworkConfig) -> Result<Self, PatchworkError> {
        Self::new(origin, config.tile_size, config.patch_size)
    }

    pub fn cell_count(&self) -> usize {
        self.grid_size as usize * self.grid_size as usize
    }

    /// Points on the east or south edge of the tile fall into the last column or row.
    pub fn locate(&self, x: f64, y: f64) -> Result<PatchCoord, PatchworkError> {
        let patch_x = ((x - self.origin.x) / self.patch_size).floor();
        let patch_y = ((self.origin.y - y) / self.patch_size).floor();

        match (self.clamp(patch_x), self.clamp(patch_y)) {
            (Some(patch_x), Some(patch_y)) => Ok(PatchCoord::new(patch_x, patch_y)),
            _ => Err(PatchworkError::OutsideTile {
                x,
                y,
                origin: self.origin,
            }),
        }
    }

    fn clamp(&self, index: f64) -> Option<u32> {
        let size = self.grid_size as f64;
        if index == size {
            self.grid_size.checked_sub(1)
        } else if index >= 0.0 && index < size {
            Some(index as u32)
        } else {
            None
        }
    }
}
