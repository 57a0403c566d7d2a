use std::{collections::BTreeSet, path::Path};

use serde::Serialize;

use pcd_core::pointcloud::point::Point;
use pcd_exporter::{
    geotiff::{read_single_band, write_single_band, EpsgCode, GeoTransform},
    ExportError,
};

use crate::{
    error::PatchworkError,
    patch::{PatchCoord, PatchGrid},
    tile::TileOrigin,
};

/// One byte per patch, row-major: row is `patch_y`, column is `patch_x`.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    pub grid: PatchGrid,
    cells: Vec<u8>,
}

impl OccupancyGrid {
    pub fn new(grid: PatchGrid) -> Self {
        Self {
            grid,
            cells: vec![0; grid.cell_count()],
        }
    }

    pub fn from_patches<I>(grid: PatchGrid, patches: I) -> Self
    where
        I: IntoIterator<Item = PatchCoord>,
    {
        let mut occupancy = Self::new(grid);
        for patch in patches {
            occupancy.mark(patch);
        }
        occupancy
    }

    pub fn size(&self) -> u32 {
        self.grid.grid_size
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    fn index(&self, patch: PatchCoord) -> Option<usize> {
        let size = self.size();
        (patch.x < size && patch.y < size)
            .then(|| patch.y as usize * size as usize + patch.x as usize)
    }

    /// Ignores patches outside the grid.
    pub fn mark(&mut self, patch: PatchCoord) {
        if let Some(index) = self.index(patch) {
            self.cells[index] = 1;
        }
    }

    pub fn is_occupied(&self, patch: PatchCoord) -> bool {
        self.index(patch)
            .is_some_and(|index| self.cells[index] == 1)
    }

    pub fn occupied_patches(&self) -> BTreeSet<PatchCoord> {
        let size = self.size() as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == 1)
            .map(|(index, _)| PatchCoord::new((index % size) as u32, (index / size) as u32))
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell == 1).count()
    }

    /// Single-band GeoTIFF anchored on the tile origin, one pixel per patch.
    pub fn write_geotiff(&self, path: &Path, epsg: Option<EpsgCode>) -> Result<(), PatchworkError> {
        let transform = GeoTransform {
            origin_x: self.grid.origin.x,
            origin_y: self.grid.origin.y,
            pixel_size: self.grid.patch_size,
        };
        write_single_band(path, self.size(), self.size(), &self.cells, &transform, epsg)?;
        log::info!(
            "wrote indices map {:?} ({} occupied patches)",
            path,
            self.occupied_count()
        );
        Ok(())
    }

    pub fn read_geotiff(path: &Path) -> Result<Self, PatchworkError> {
        let raster = read_single_band(path)?;
        log::debug!(
            "read {}x{} indices map {:?} (EPSG {:?})",
            raster.width,
            raster.height,
            path,
            raster.epsg
        );
        if raster.width != raster.height {
            return Err(ExportError::InvalidRaster {
                path: path.to_path_buf(),
                reason: format!("{}x{} raster is not square", raster.width, raster.height),
            }
            .into());
        }

        let grid = PatchGrid {
            origin: TileOrigin::new(raster.transform.origin_x, raster.transform.origin_y),
            patch_size: raster.transform.pixel_size,
            grid_size: raster.width,
        };
        let cells = raster
            .values
            .iter()
            .map(|value| u8::from(*value == 1.0))
            .collect();
        Ok(Self { grid, cells })
    }
}

/// Marks the patch of every point. An empty slice gives an all-zero grid.
pub fn build_occupancy_grid(
    points: &[Point],
    tile_origin: TileOrigin,
    patch_size: f64,
    tile_size: f64,
) -> Result<OccupancyGrid, PatchworkError> {
    let grid = PatchGrid::new(tile_origin, tile_size, patch_size)?;
    let patches = points
        .iter()
        .map(|point| grid.locate(point.x, point.y))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OccupancyGrid::from_patches(grid, patches))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexRow {
    pub patch_x: f64,
    pub patch_y: f64,
}

/// Rows of an indices map for every cell equal to 1, scanning row by row.
///
/// `patch_x` is `column * patch_size + origin_x` and `patch_y` is
/// `height - (origin_y - row * patch_size)`.
pub fn read_indices_map(path: &Path, patch_size: f64) -> Result<Vec<IndexRow>, PatchworkError> {
    let raster = read_single_band(path)?;
    let width = raster.width as usize;
    let rows = raster
        .values
        .iter()
        .enumerate()
        .filter(|(_, value)| **value == 1.0)
        .map(|(index, _)| {
            let (row, column) = ((index / width) as f64, (index % width) as f64);
            IndexRow {
                patch_x: column * patch_size + raster.transform.origin_x,
                patch_y: raster.height as f64 - (raster.transform.origin_y - row * patch_size),
            }
        })
        .collect();
    Ok(rows)
}
