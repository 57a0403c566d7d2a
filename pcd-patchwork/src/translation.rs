use std::collections::BTreeMap;

use pcd_exporter::las::NewDimension;
use pcd_parser::extra_bytes::ExtraBytesType;

use crate::{config::PatchworkConfig, error::PatchworkError, table::PatchTable};

/// Signed integer type of the provenance column.
pub fn column_type_for_size(size: u32) -> Result<ExtraBytesType, PatchworkError> {
    u8::try_from(size)
        .ok()
        .and_then(ExtraBytesType::signed_from_bits)
        .ok_or(PatchworkError::InvalidColumnSize(size))
}

/// Rewrites every classification through `translation`.
/// Nothing is modified when one of the codes has no entry.
pub fn translate_classifications(
    table: &mut PatchTable,
    translation: &BTreeMap<u8, u8>,
) -> Result<(), PatchworkError> {
    if let Some(row) = table
        .rows
        .iter()
        .find(|row| !translation.contains_key(&row.classification))
    {
        return Err(PatchworkError::UnknownClassification(row.classification));
    }

    for row in &mut table.rows {
        if let Some(code) = translation.get(&row.classification) {
            row.classification = *code;
        }
    }
    Ok(())
}

/// The column tagging added points, `None` when classifications are translated instead.
pub fn provenance_dimension(
    config: &PatchworkConfig,
) -> Result<Option<NewDimension>, PatchworkError> {
    config
        .new_column
        .as_ref()
        .map(|name| {
            Ok(NewDimension {
                name: name.clone(),
                data_type: column_type_for_size(config.new_column_size)?,
                added_value: config.value_added_points as f64,
            })
        })
        .transpose()
}
