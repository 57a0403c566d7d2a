use std::{
    fs,
    path::{Path, PathBuf},
};

use las::{Builder, Header, Reader, Vlr, Writer};
use tempfile::NamedTempFile;

use pcd_core::pointcloud::point::PointCloud;
use pcd_parser::{
    extra_bytes::{
        is_extra_bytes_vlr, parse_extra_bytes_vlr, ExtraBytesDescriptor, ExtraBytesType,
        DESCRIPTOR_SIZE, EXTRA_BYTES_RECORD_ID, EXTRA_BYTES_USER_ID,
    },
    layout::DimensionLayout,
};

use crate::error::ExportError;

const LASZIP_USER_ID: &str = "laszip encoded";

/// Highest class stored by point formats 0 to 5.
pub const MAX_LEGACY_CLASSIFICATION: u8 = 31;

/// Extra-bytes dimension declared on the output only.
/// Recipient points get 0, appended points get `added_value`.
#[derive(Debug, Clone)]
pub struct NewDimension {
    pub name: String,
    pub data_type: ExtraBytesType,
    pub added_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub recipient_points: u64,
    pub appended_points: u64,
}

impl WriteSummary {
    pub fn total(&self) -> u64 {
        self.recipient_points + self.appended_points
    }
}

/// Writes `recipient_path` followed by `appended` into `output_path`.
///
/// Only the attributes of `appended` that the output layout declares are copied,
/// every other field of an appended record stays at zero. The file is written
/// next to `output_path` and only renamed into place once complete.
pub fn write_merged_las(
    recipient_path: &Path,
    output_path: &Path,
    appended: &PointCloud,
    new_dimension: Option<&NewDimension>,
) -> Result<WriteSummary, ExportError> {
    let mut reader = Reader::from_path(recipient_path)?;
    let recipient_layout = DimensionLayout::from_header(reader.header())?;

    if let Some(dimension) = new_dimension {
        if recipient_layout.has_attribute(&dimension.name) {
            return Err(ExportError::DuplicateDimension {
                name: dimension.name.clone(),
                path: recipient_path.to_path_buf(),
            });
        }
    }

    let header = output_header(
        reader.header(),
        &recipient_layout,
        new_dimension,
        is_laz(output_path),
    )?;
    let output_layout = DimensionLayout::from_header(&header)?;
    let record_extra_bytes = output_layout.format.extra_bytes as usize;

    if !output_layout.format.is_extended {
        if let Some(code) = appended
            .points
            .iter()
            .map(|point| point.classification)
            .find(|code| *code > MAX_LEGACY_CLASSIFICATION)
        {
            return Err(ExportError::ClassificationOutOfRange {
                code,
                path: recipient_path.to_path_buf(),
            });
        }
    }

    let temp = temp_file_for(output_path)?;
    let mut writer = Writer::from_path(temp.path(), header)?;
    let mut summary = WriteSummary::default();

    for las_point in reader.points() {
        let mut las_point = las_point?;
        las_point.extra_bytes.resize(record_extra_bytes, 0);
        writer.write_point(las_point)?;
        summary.recipient_points += 1;
    }

    let mut skipped: Vec<&str> = Vec::new();
    for point in &appended.points {
        let mut las_point = output_layout.blank_las_point()?;
        las_point.x = point.x;
        las_point.y = point.y;
        las_point.z = point.z;
        las_point.is_synthetic = point.synthetic;
        DimensionLayout::set_classification(&mut las_point, point.classification)?;

        for (name, value) in appended.attribute_names.iter().zip(&point.attributes) {
            if new_dimension.is_some_and(|dimension| dimension.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            if !output_layout.set_attribute(&mut las_point, name, *value)?
                && !skipped.contains(&name.as_str())
            {
                skipped.push(name);
            }
        }
        if let Some(dimension) = new_dimension {
            output_layout.set_attribute(&mut las_point, &dimension.name, dimension.added_value)?;
        }

        writer.write_point(las_point)?;
        summary.appended_points += 1;
    }
    if !skipped.is_empty() {
        log::debug!("attributes not declared by {:?}: {:?}", recipient_path, skipped);
    }

    writer.close()?;
    drop(writer);
    temp.persist(output_path)?;

    log::info!(
        "wrote {:?}: {} recipient points, {} appended points",
        output_path,
        summary.recipient_points,
        summary.appended_points
    );
    Ok(summary)
}

/// Copies `source` to `output_path` through a temporary file in the destination directory.
pub fn copy_file(source: &Path, output_path: &Path) -> Result<(), ExportError> {
    let temp = temp_file_for(output_path)?;
    fs::copy(source, temp.path())?;
    temp.persist(output_path)?;
    Ok(())
}

pub(crate) fn temp_file_for(output_path: &Path) -> Result<NamedTempFile, ExportError> {
    let directory = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory)?;

    let suffix = output_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    Ok(tempfile::Builder::new()
        .prefix(".patchwork-")
        .suffix(&suffix)
        .tempfile_in(directory)?)
}

fn is_laz(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("laz"))
}

fn output_header(
    recipient_header: &Header,
    recipient_layout: &DimensionLayout,
    new_dimension: Option<&NewDimension>,
    compressed: bool,
) -> Result<Header, ExportError> {
    let mut builder = Builder::from(recipient_header.clone());
    builder.vlrs.retain(|vlr| vlr.user_id != LASZIP_USER_ID);
    builder.point_format.is_compressed = compressed;

    if let Some(dimension) = new_dimension {
        let existing_extra_bytes = recipient_layout.format.extra_bytes as usize;
        let mut descriptors = Vec::new();

        let extra_bytes_vlr = builder.vlrs.iter().position(is_extra_bytes_vlr);
        let declared: usize = match extra_bytes_vlr {
            Some(index) => parse_extra_bytes_vlr(&builder.vlrs[index])?
                .iter()
                .map(|dim| dim.byte_offset + dim.descriptor.data_type.size())
                .max()
                .unwrap_or(0),
            None => 0,
        };
        // Undeclared trailing bytes keep their place before the new dimension.
        let mut gap = existing_extra_bytes.saturating_sub(declared);
        while gap > 0 {
            let size = gap.min(u8::MAX as usize);
            descriptors.extend(undocumented_descriptor(size as u8));
            gap -= size;
        }
        descriptors.extend(
            ExtraBytesDescriptor::new(&dimension.name, dimension.data_type, "patchwork").encode(),
        );

        match extra_bytes_vlr {
            Some(index) => builder.vlrs[index].data.extend(descriptors),
            None => builder.vlrs.push(Vlr {
                user_id: EXTRA_BYTES_USER_ID.to_string(),
                record_id: EXTRA_BYTES_RECORD_ID,
                description: "Extra Bytes Record".to_string(),
                data: descriptors,
            }),
        }
        builder.point_format.extra_bytes += dimension.data_type.size() as u16;
    }

    Ok(builder.into_header()?)
}

fn undocumented_descriptor(size: u8) -> [u8; DESCRIPTOR_SIZE] {
    let mut record = [0u8; DESCRIPTOR_SIZE];
    record[3] = size;
    record
}
