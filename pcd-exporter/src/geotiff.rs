use std::{
    fs::File,
    io::{BufReader, BufWriter, Seek, Write},
    path::Path,
};

use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype, TiffEncoder},
    tags::Tag,
    ColorType,
};

use crate::{error::ExportError, las::temp_file_for};

pub type EpsgCode = u16;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// North-up georeference: `origin` is the top-left corner of the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleBandRaster {
    pub width: u32,
    pub height: u32,
    /// Row-major, row 0 first.
    pub values: Vec<f64>,
    pub transform: GeoTransform,
    pub epsg: Option<EpsgCode>,
}

/// Writes a one band 8-bit GeoTIFF with the given georeference.
pub fn write_single_band(
    path: &Path,
    width: u32,
    height: u32,
    cells: &[u8],
    transform: &GeoTransform,
    epsg: Option<EpsgCode>,
) -> Result<(), ExportError> {
    if cells.len() != width as usize * height as usize {
        return Err(ExportError::InvalidRaster {
            path: path.to_path_buf(),
            reason: format!(
                "{} cells do not fill a {}x{} raster",
                cells.len(),
                width,
                height
            ),
        });
    }

    let mut temp = temp_file_for(path)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write_tiff(&mut writer, width, height, cells, transform, epsg)?;
        writer.flush()?;
    }
    temp.persist(path)?;

    log::debug!("wrote {}x{} raster {:?}", width, height, path);
    Ok(())
}

fn write_tiff<W: Write + Seek>(
    writer: W,
    width: u32,
    height: u32,
    cells: &[u8],
    transform: &GeoTransform,
    epsg: Option<EpsgCode>,
) -> Result<(), ExportError> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray8>(width, height)?;

    let pixel_scale = [transform.pixel_size, transform.pixel_size, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &pixel_scale[..])?;
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])?;
    image.encoder().write_tag(
        Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY),
        &geo_key_directory(epsg)[..],
    )?;
    image.write_data(cells)?;
    Ok(())
}

pub fn read_single_band(path: &Path) -> Result<SingleBandRaster, ExportError> {
    let invalid = |reason: &str| ExportError::InvalidRaster {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;
    if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
        return Err(invalid("expected a single band raster"));
    }

    let pixel_scale = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))?
        .map(|value| value.into_f64_vec())
        .transpose()?
        .ok_or_else(|| invalid("missing ModelPixelScale tag"))?;
    let tiepoint = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT))?
        .map(|value| value.into_f64_vec())
        .transpose()?
        .ok_or_else(|| invalid("missing ModelTiepoint tag"))?;
    if pixel_scale.is_empty() || tiepoint.len() < 6 {
        return Err(invalid("malformed georeference tags"));
    }
    let geo_keys = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))?
        .map(|value| value.into_u32_vec())
        .transpose()?
        .unwrap_or_default();

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        _ => return Err(invalid("unsupported sample type")),
    };

    Ok(SingleBandRaster {
        width,
        height,
        values,
        transform: GeoTransform {
            origin_x: tiepoint[3] - tiepoint[0] * pixel_scale[0],
            origin_y: tiepoint[4] + tiepoint[1] * pixel_scale[0],
            pixel_size: pixel_scale[0],
        },
        epsg: epsg_from_geo_keys(&geo_keys),
    })
}

fn geo_key_directory(epsg: Option<EpsgCode>) -> Vec<u16> {
    // Projected model, pixel-is-area.
    let mut keys = vec![GT_MODEL_TYPE_KEY, 0, 1, 1, GT_RASTER_TYPE_KEY, 0, 1, 1];
    if let Some(code) = epsg {
        keys.extend([PROJECTED_CS_TYPE_KEY, 0, 1, code]);
    }
    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

fn epsg_from_geo_keys(geo_keys: &[u32]) -> Option<EpsgCode> {
    geo_keys
        .get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE_KEY as u32 || entry[0] == GEOGRAPHIC_TYPE_KEY as u32)
                && entry[1] == 0
        })
        .and_then(|entry| EpsgCode::try_from(entry[3]).ok())
}
