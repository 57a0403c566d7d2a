use itertools::Itertools as _;

use pcd_core::pointcloud::point::{PointCloud, CLASSIFICATION, SYNTHETIC};

use crate::{
    error::PatchworkError,
    patch::PatchGrid,
    table::{PatchRow, PatchTable},
};

/// Keeps the points of `cloud` whose classification is in `wanted_classes`,
/// locating each of them on `grid`.
///
/// The table holds the requested `extras` (lower case, without duplicates),
/// then the patch coordinates and the classification. Excluding synthetic
/// points requires `synthetic` among the extras.
pub fn select_points(
    cloud: &PointCloud,
    grid: &PatchGrid,
    wanted_classes: &[u8],
    use_synthetic: bool,
    extras: &[String],
) -> Result<PatchTable, PatchworkError> {
    let columns: Vec<String> = extras
        .iter()
        .map(|name| name.to_lowercase())
        .filter(|name| name != CLASSIFICATION)
        .unique()
        .collect();

    let fields = columns
        .iter()
        .map(|name| {
            cloud
                .field(name)
                .ok_or_else(|| PatchworkError::MissingAttribute(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !use_synthetic && !columns.iter().any(|name| name == SYNTHETIC) {
        return Err(PatchworkError::MissingAttribute(SYNTHETIC.to_string()));
    }

    let mut table = PatchTable::new(columns);
    for point in &cloud.points {
        if !wanted_classes.contains(&point.classification) {
            continue;
        }
        if !use_synthetic && point.synthetic {
            continue;
        }
        table.rows.push(PatchRow {
            values: fields.iter().map(|field| field.read(point)).collect(),
            patch: grid.locate(point.x, point.y)?,
            classification: point.classification,
        });
    }

    Ok(table)
}
