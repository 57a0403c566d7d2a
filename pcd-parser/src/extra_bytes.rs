//! LAS 1.4 "Extra Bytes" VLR (user id `LASF_Spec`, record id 4).
//!
//! Each descriptor is a fixed 192-byte record describing one additional
//! dimension stored after the standard fields of every point record.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt as _, WriteBytesExt as _};
use las::Vlr;

use crate::error::LasError;

pub const EXTRA_BYTES_USER_ID: &str = "LASF_Spec";
pub const EXTRA_BYTES_RECORD_ID: u16 = 4;
pub const DESCRIPTOR_SIZE: usize = 192;

const NAME_OFFSET: usize = 4;
const NAME_SIZE: usize = 32;
const SCALE_OFFSET: usize = 112;
const OFFSET_OFFSET: usize = 136;
const DESCRIPTION_OFFSET: usize = 160;
const DESCRIPTION_SIZE: usize = 32;

const OPTION_SCALE: u8 = 1 << 3;
const OPTION_OFFSET: u8 = 1 << 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraBytesType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ExtraBytesType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::U8),
            2 => Some(Self::I8),
            3 => Some(Self::U16),
            4 => Some(Self::I16),
            5 => Some(Self::U32),
            6 => Some(Self::I32),
            7 => Some(Self::U64),
            8 => Some(Self::I64),
            9 => Some(Self::F32),
            10 => Some(Self::F64),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::I8 => 2,
            Self::U16 => 3,
            Self::I16 => 4,
            Self::U32 => 5,
            Self::I32 => 6,
            Self::U64 => 7,
            Self::I64 => 8,
            Self::F32 => 9,
            Self::F64 => 10,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Signed integer type of the given bit width.
    pub fn signed_from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::I8),
            16 => Some(Self::I16),
            32 => Some(Self::I32),
            64 => Some(Self::I64),
            _ => None,
        }
    }

    fn read(&self, bytes: &[u8]) -> std::io::Result<f64> {
        let mut cursor = Cursor::new(bytes);
        let value = match self {
            Self::U8 => cursor.read_u8()? as f64,
            Self::I8 => cursor.read_i8()? as f64,
            Self::U16 => cursor.read_u16::<LittleEndian>()? as f64,
            Self::I16 => cursor.read_i16::<LittleEndian>()? as f64,
            Self::U32 => cursor.read_u32::<LittleEndian>()? as f64,
            Self::I32 => cursor.read_i32::<LittleEndian>()? as f64,
            Self::U64 => cursor.read_u64::<LittleEndian>()? as f64,
            Self::I64 => cursor.read_i64::<LittleEndian>()? as f64,
            Self::F32 => cursor.read_f32::<LittleEndian>()? as f64,
            Self::F64 => cursor.read_f64::<LittleEndian>()?,
        };
        Ok(value)
    }

    // Float to int casts saturate, so out-of-range values are clamped to the type bounds.
    fn write(&self, mut bytes: &mut [u8], value: f64) -> std::io::Result<()> {
        match self {
            Self::U8 => bytes.write_u8(value.round() as u8),
            Self::I8 => bytes.write_i8(value.round() as i8),
            Self::U16 => bytes.write_u16::<LittleEndian>(value.round() as u16),
            Self::I16 => bytes.write_i16::<LittleEndian>(value.round() as i16),
            Self::U32 => bytes.write_u32::<LittleEndian>(value.round() as u32),
            Self::I32 => bytes.write_i32::<LittleEndian>(value.round() as i32),
            Self::U64 => bytes.write_u64::<LittleEndian>(value.round() as u64),
            Self::I64 => bytes.write_i64::<LittleEndian>(value.round() as i64),
            Self::F32 => bytes.write_f32::<LittleEndian>(value as f32),
            Self::F64 => bytes.write_f64::<LittleEndian>(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraBytesDescriptor {
    pub name: String,
    pub data_type: ExtraBytesType,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub description: String,
}

impl ExtraBytesDescriptor {
    pub fn new(name: &str, data_type: ExtraBytesType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            scale: None,
            offset: None,
            description: description.to_string(),
        }
    }

    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut record = [0u8; DESCRIPTOR_SIZE];
        record[2] = self.data_type.code();

        let mut options = 0;
        if self.scale.is_some() {
            options |= OPTION_SCALE;
        }
        if self.offset.is_some() {
            options |= OPTION_OFFSET;
        }
        record[3] = options;

        copy_padded(&mut record[NAME_OFFSET..NAME_OFFSET + NAME_SIZE], &self.name);
        if let Some(scale) = self.scale {
            record[SCALE_OFFSET..SCALE_OFFSET + 8].copy_from_slice(&scale.to_le_bytes());
        }
        if let Some(offset) = self.offset {
            record[OFFSET_OFFSET..OFFSET_OFFSET + 8].copy_from_slice(&offset.to_le_bytes());
        }
        copy_padded(
            &mut record[DESCRIPTION_OFFSET..DESCRIPTION_OFFSET + DESCRIPTION_SIZE],
            &self.description,
        );
        record
    }

    pub fn to_vlr_data(descriptors: &[ExtraBytesDescriptor]) -> Vec<u8> {
        descriptors
            .iter()
            .flat_map(|descriptor| descriptor.encode())
            .collect()
    }
}

/// A named dimension and where its bytes live inside `las::Point::extra_bytes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraBytesDimension {
    pub descriptor: ExtraBytesDescriptor,
    pub byte_offset: usize,
}

impl ExtraBytesDimension {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn read(&self, extra_bytes: &[u8]) -> Result<f64, LasError> {
        let size = self.descriptor.data_type.size();
        let bytes = extra_bytes
            .get(self.byte_offset..self.byte_offset + size)
            .ok_or_else(|| self.too_short(extra_bytes.len()))?;
        let raw = self.descriptor.data_type.read(bytes)?;
        Ok(raw * self.descriptor.scale.unwrap_or(1.0) + self.descriptor.offset.unwrap_or(0.0))
    }

    pub fn write(&self, extra_bytes: &mut [u8], value: f64) -> Result<(), LasError> {
        let size = self.descriptor.data_type.size();
        let available = extra_bytes.len();
        let bytes = extra_bytes
            .get_mut(self.byte_offset..self.byte_offset + size)
            .ok_or_else(|| self.too_short(available))?;
        let raw =
            (value - self.descriptor.offset.unwrap_or(0.0)) / self.descriptor.scale.unwrap_or(1.0);
        self.descriptor.data_type.write(bytes, raw)?;
        Ok(())
    }

    fn too_short(&self, length: usize) -> LasError {
        LasError::MalformedExtraBytes(format!(
            "dimension '{}' needs bytes {}..{} but the point only has {}",
            self.descriptor.name,
            self.byte_offset,
            self.byte_offset + self.descriptor.data_type.size(),
            length
        ))
    }
}

pub fn is_extra_bytes_vlr(vlr: &Vlr) -> bool {
    vlr.user_id == EXTRA_BYTES_USER_ID && vlr.record_id == EXTRA_BYTES_RECORD_ID
}

/// Decodes the descriptors of an Extra Bytes VLR into named dimensions.
///
/// Undocumented extra bytes (data type 0) are skipped but still advance the
/// byte offset, their size being stored in the options field.
pub fn parse_extra_bytes_vlr(vlr: &Vlr) -> Result<Vec<ExtraBytesDimension>, LasError> {
    if vlr.data.len() % DESCRIPTOR_SIZE != 0 {
        return Err(LasError::MalformedExtraBytes(format!(
            "record length {} is not a multiple of {}",
            vlr.data.len(),
            DESCRIPTOR_SIZE
        )));
    }

    let mut dimensions = Vec::new();
    let mut byte_offset = 0;
    for record in vlr.data.chunks_exact(DESCRIPTOR_SIZE) {
        let code = record[2];
        let options = record[3];
        let name = read_padded(&record[NAME_OFFSET..NAME_OFFSET + NAME_SIZE]);

        if code == 0 {
            byte_offset += options as usize;
            continue;
        }
        let data_type = ExtraBytesType::from_code(code).ok_or_else(|| {
            LasError::UnsupportedExtraBytesType {
                name: name.clone(),
                data_type: code,
            }
        })?;

        let scale = (options & OPTION_SCALE != 0).then(|| read_f64(record, SCALE_OFFSET));
        let offset = (options & OPTION_OFFSET != 0).then(|| read_f64(record, OFFSET_OFFSET));
        let description =
            read_padded(&record[DESCRIPTION_OFFSET..DESCRIPTION_OFFSET + DESCRIPTION_SIZE]);

        dimensions.push(ExtraBytesDimension {
            descriptor: ExtraBytesDescriptor {
                name,
                data_type,
                scale,
                offset,
                description,
            },
            byte_offset,
        });
        byte_offset += data_type.size();
    }

    Ok(dimensions)
}

fn read_f64(record: &[u8], at: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&record[at..at + 8]);
    f64::from_le_bytes(bytes)
}

fn read_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn copy_padded(target: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let length = bytes.len().min(target.len());
    target[..length].copy_from_slice(&bytes[..length]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlr_with(descriptors: &[ExtraBytesDescriptor]) -> Vlr {
        Vlr {
            user_id: EXTRA_BYTES_USER_ID.to_string(),
            record_id: EXTRA_BYTES_RECORD_ID,
            description: "Extra Bytes".to_string(),
            data: ExtraBytesDescriptor::to_vlr_data(descriptors),
        }
    }

    #[test]
    fn test_parse_offsets_follow_declaration_order() {
        let vlr = vlr_with(&[
            ExtraBytesDescriptor::new("Origin", ExtraBytesType::I8, "added points"),
            ExtraBytesDescriptor::new("height", ExtraBytesType::F64, ""),
            ExtraBytesDescriptor::new("f3", ExtraBytesType::U64, ""),
        ]);
        assert!(is_extra_bytes_vlr(&vlr));

        let dimensions = parse_extra_bytes_vlr(&vlr).unwrap();
        assert_eq!(dimensions.len(), 3);
        assert_eq!(dimensions[0].name(), "Origin");
        assert_eq!(dimensions[0].descriptor.description, "added points");
        assert_eq!(dimensions[0].byte_offset, 0);
        assert_eq!(dimensions[1].byte_offset, 1);
        assert_eq!(dimensions[2].byte_offset, 9);
        assert_eq!(dimensions[2].descriptor.data_type, ExtraBytesType::U64);
    }

    #[test]
    fn test_scaled_value_is_restored() {
        let mut descriptor = ExtraBytesDescriptor::new("amplitude", ExtraBytesType::I32, "");
        descriptor.scale = Some(0.01);
        descriptor.offset = Some(100.0);
        let dimensions = parse_extra_bytes_vlr(&vlr_with(&[descriptor])).unwrap();

        let dimension = &dimensions[0];
        let mut extra_bytes = vec![0u8; 4];
        dimension.write(&mut extra_bytes, 123.45).unwrap();
        assert_eq!(i32::from_le_bytes(extra_bytes.clone().try_into().unwrap()), 2345);
        assert!((dimension.read(&extra_bytes).unwrap() - 123.45).abs() < 1e-9);
    }

    #[test]
    fn test_undocumented_bytes_are_skipped() {
        let mut data = vec![0u8; DESCRIPTOR_SIZE];
        data[3] = 3;
        data.extend(ExtraBytesDescriptor::new("after", ExtraBytesType::U16, "").encode());
        let vlr = Vlr {
            user_id: EXTRA_BYTES_USER_ID.to_string(),
            record_id: EXTRA_BYTES_RECORD_ID,
            description: String::new(),
            data,
        };

        let dimensions = parse_extra_bytes_vlr(&vlr).unwrap();
        assert_eq!(dimensions.len(), 1);
        assert_eq!(dimensions[0].byte_offset, 3);
    }

    #[test]
    fn test_malformed_records_are_rejected() {
        let mut vlr = vlr_with(&[ExtraBytesDescriptor::new("a", ExtraBytesType::U8, "")]);
        vlr.data.pop();
        assert!(matches!(
            parse_extra_bytes_vlr(&vlr),
            Err(LasError::MalformedExtraBytes(_))
        ));

        let mut vlr = vlr_with(&[ExtraBytesDescriptor::new("array", ExtraBytesType::U8, "")]);
        vlr.data[2] = 21;
        assert!(matches!(
            parse_extra_bytes_vlr(&vlr),
            Err(LasError::UnsupportedExtraBytesType { data_type: 21, .. })
        ));
    }

    #[test]
    fn test_signed_from_bits() {
        assert_eq!(ExtraBytesType::signed_from_bits(8), Some(ExtraBytesType::I8));
        assert_eq!(ExtraBytesType::signed_from_bits(16), Some(ExtraBytesType::I16));
        assert_eq!(ExtraBytesType::signed_from_bits(32), Some(ExtraBytesType::I32));
        assert_eq!(ExtraBytesType::signed_from_bits(64), Some(ExtraBytesType::I64));
        assert_eq!(ExtraBytesType::signed_from_bits(7), None);
    }

    #[test]
    fn test_write_out_of_range_saturates() {
        let dimension = ExtraBytesDimension {
            descriptor: ExtraBytesDescriptor::new("small", ExtraBytesType::I8, ""),
            byte_offset: 0,
        };
        let mut extra_bytes = vec![0u8; 1];
        dimension.write(&mut extra_bytes, 1000.0).unwrap();
        assert_eq!(dimension.read(&extra_bytes).unwrap(), 127.0);
    }
}
