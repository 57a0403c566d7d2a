use std::collections::HashMap;

use itertools::Itertools as _;

use pcd_core::pointcloud::point::{Point, PointCloud, CLASSIFICATION, SYNTHETIC, X, Y, Z};

use crate::{
    error::PatchworkError,
    patch::{PatchCoord, PATCH_X, PATCH_Y},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PatchRow {
    /// Aligned with `PatchTable::columns`.
    pub values: Vec<f64>,
    pub patch: PatchCoord,
    pub classification: u8,
}

/// Selected points with their patch. Columns are the requested extras, followed
/// by `patch_x`, `patch_y` and `classification`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchTable {
    pub columns: Vec<String>,
    pub rows: Vec<PatchRow>,
}

impl PatchTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// No rows, coordinate columns only.
    pub fn empty_with_coordinates() -> Self {
        Self::new(vec![X.to_string(), Y.to_string(), Z.to_string()])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .cloned()
            .chain([PATCH_X, PATCH_Y, CLASSIFICATION].map(String::from))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: &PatchRow, name: &str) -> Option<f64> {
        match name.to_lowercase().as_str() {
            PATCH_X => Some(row.patch.x as f64),
            PATCH_Y => Some(row.patch.y as f64),
            CLASSIFICATION => Some(row.classification as f64),
            _ => self.column(name).map(|index| row.values[index]),
        }
    }

    /// Number of rows per patch. Patches without rows are absent.
    pub fn counts_by_patch(&self) -> HashMap<PatchCoord, usize> {
        self.rows.iter().map(|row| row.patch).counts()
    }

    pub fn retain<F>(&mut self, predicate: F)
    where
        F: FnMut(&PatchRow) -> bool,
    {
        self.rows.retain(predicate);
    }

    /// Stacks tables. Columns are the union in first-seen order and a table
    /// lacking a column contributes 0 for it.
    pub fn concat(tables: Vec<PatchTable>) -> PatchTable {
        let columns: Vec<String> = tables
            .iter()
            .flat_map(|table| table.columns.iter().cloned())
            .unique()
            .collect();

        let mut result = PatchTable::new(columns);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|column| result.column(column))
                .collect();
            for row in table.rows {
                let mut values = vec![0.0; result.columns.len()];
                for (value, index) in row.values.into_iter().zip(&mapping) {
                    values[*index] = value;
                }
                result.rows.push(PatchRow { values, ..row });
            }
        }
        result
    }

    /// Converts the rows back to points. `x`, `y` and `z` are required, a
    /// `synthetic` column sets the flag and the other columns become attributes.
    pub fn to_point_cloud(&self) -> Result<PointCloud, PatchworkError> {
        let coordinate = |name: &str| {
            self.column(name)
                .ok_or_else(|| PatchworkError::MissingAttribute(name.to_string()))
        };
        let (x, y, z) = (coordinate(X)?, coordinate(Y)?, coordinate(Z)?);
        let synthetic = self.column(SYNTHETIC);

        let attribute_indices: Vec<usize> = (0..self.columns.len())
            .filter(|index| ![Some(x), Some(y), Some(z), synthetic].contains(&Some(*index)))
            .collect();
        let attribute_names = attribute_indices
            .iter()
            .map(|index| self.columns[*index].clone())
            .collect();

        let points = self
            .rows
            .iter()
            .map(|row| Point {
                x: row.values[x],
                y: row.values[y],
                z: row.values[z],
                classification: row.classification,
                synthetic: synthetic.is_some_and(|index| row.values[index] != 0.0),
                attributes: attribute_indices
                    .iter()
                    .map(|index| row.values[*index])
                    .collect(),
            })
            .collect();

        Ok(PointCloud::new(points, attribute_names))
    }
}
