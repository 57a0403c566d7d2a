use las::{
    point::{Classification, Format, ScanDirection},
    Color, Header,
};
use pcd_core::pointcloud::point::Point;

use crate::{
    error::LasError,
    extra_bytes::{is_extra_bytes_vlr, parse_extra_bytes_vlr, ExtraBytesDimension},
};

/// Standard LAS dimensions other than x, y, z, classification and the synthetic flag,
/// which `Point` carries as typed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardDimension {
    Intensity,
    ReturnNumber,
    NumberOfReturns,
    ScanDirectionFlag,
    EdgeOfFlightLine,
    KeyPoint,
    Withheld,
    Overlap,
    ScannerChannel,
    ScanAngle,
    UserData,
    PointSourceId,
    GpsTime,
    Red,
    Green,
    Blue,
    Nir,
}

impl StandardDimension {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Intensity => "intensity",
            Self::ReturnNumber => "return_number",
            Self::NumberOfReturns => "number_of_returns",
            Self::ScanDirectionFlag => "scan_direction_flag",
            Self::EdgeOfFlightLine => "edge_of_flight_line",
            Self::KeyPoint => "key_point",
            Self::Withheld => "withheld",
            Self::Overlap => "overlap",
            Self::ScannerChannel => "scanner_channel",
            Self::ScanAngle => "scan_angle",
            Self::UserData => "user_data",
            Self::PointSourceId => "point_source_id",
            Self::GpsTime => "gps_time",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Nir => "nir",
        }
    }

    /// Dimensions stored by a point format, in record order.
    pub fn for_format(format: &Format) -> Vec<StandardDimension> {
        let mut dimensions = vec![
            Self::Intensity,
            Self::ReturnNumber,
            Self::NumberOfReturns,
            Self::ScanDirectionFlag,
            Self::EdgeOfFlightLine,
            Self::KeyPoint,
            Self::Withheld,
        ];
        if format.is_extended {
            dimensions.push(Self::Overlap);
            dimensions.push(Self::ScannerChannel);
        }
        dimensions.extend([Self::ScanAngle, Self::UserData, Self::PointSourceId]);
        if format.has_gps_time {
            dimensions.push(Self::GpsTime);
        }
        if format.has_color {
            dimensions.extend([Self::Red, Self::Green, Self::Blue]);
        }
        if format.has_nir {
            dimensions.push(Self::Nir);
        }
        dimensions
    }

    pub fn read(&self, point: &las::Point) -> f64 {
        let flag = |value: bool| if value { 1.0 } else { 0.0 };
        match self {
            Self::Intensity => point.intensity as f64,
            Self::ReturnNumber => point.return_number as f64,
            Self::NumberOfReturns => point.number_of_returns as f64,
            Self::ScanDirectionFlag => flag(point.scan_direction == ScanDirection::LeftToRight),
            Self::EdgeOfFlightLine => flag(point.is_edge_of_flight_line),
            Self::KeyPoint => flag(point.is_key_point),
            Self::Withheld => flag(point.is_withheld),
            Self::Overlap => flag(point.is_overlap),
            Self::ScannerChannel => point.scanner_channel as f64,
            Self::ScanAngle => point.scan_angle as f64,
            Self::UserData => point.user_data as f64,
            Self::PointSourceId => point.point_source_id as f64,
            Self::GpsTime => point.gps_time.unwrap_or(0.0),
            Self::Red => point.color.map(|c| c.red).unwrap_or(0) as f64,
            Self::Green => point.color.map(|c| c.green).unwrap_or(0) as f64,
            Self::Blue => point.color.map(|c| c.blue).unwrap_or(0) as f64,
            Self::Nir => point.nir.unwrap_or(0) as f64,
        }
    }

    pub fn write(&self, point: &mut las::Point, value: f64) {
        match self {
            Self::Intensity => point.intensity = value as u16,
            Self::ReturnNumber => point.return_number = value as u8,
            Self::NumberOfReturns => point.number_of_returns = value as u8,
            Self::ScanDirectionFlag => {
                point.scan_direction = if value != 0.0 {
                    ScanDirection::LeftToRight
                } else {
                    ScanDirection::RightToLeft
                }
            }
            Self::EdgeOfFlightLine => point.is_edge_of_flight_line = value != 0.0,
            Self::KeyPoint => point.is_key_point = value != 0.0,
            Self::Withheld => point.is_withheld = value != 0.0,
            Self::Overlap => point.is_overlap = value != 0.0,
            Self::ScannerChannel => point.scanner_channel = value as u8,
            Self::ScanAngle => point.scan_angle = value as f32,
            Self::UserData => point.user_data = value as u8,
            Self::PointSourceId => point.point_source_id = value as u16,
            Self::GpsTime => point.gps_time = Some(value),
            Self::Red => point.color.get_or_insert(Color::new(0, 0, 0)).red = value as u16,
            Self::Green => point.color.get_or_insert(Color::new(0, 0, 0)).green = value as u16,
            Self::Blue => point.color.get_or_insert(Color::new(0, 0, 0)).blue = value as u16,
            Self::Nir => point.nir = Some(value as u16),
        }
    }
}

/// Field layout of a LAS file: which standard dimensions its point format
/// stores and which extra-bytes dimensions its header declares.
#[derive(Debug, Clone)]
pub struct DimensionLayout {
    pub format: Format,
    pub standard: Vec<StandardDimension>,
    pub extra: Vec<ExtraBytesDimension>,
}

impl DimensionLayout {
    pub fn from_header(header: &Header) -> Result<Self, LasError> {
        let format = header.point_format().clone();
        let standard = StandardDimension::for_format(&format);

        let extra = match header
            .vlrs()
            .iter()
            .chain(header.evlrs().iter())
            .find(|vlr| is_extra_bytes_vlr(vlr))
        {
            Some(vlr) => parse_extra_bytes_vlr(vlr)?,
            None => Vec::new(),
        };

        Ok(Self {
            format,
            standard,
            extra,
        })
    }

    /// Names of the attributes carried next to the typed fields of `Point`, lower case.
    pub fn attribute_names(&self) -> Vec<String> {
        self.standard
            .iter()
            .map(|dimension| dimension.name().to_string())
            .chain(self.extra.iter().map(|dimension| dimension.name().to_lowercase()))
            .collect()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names()
            .iter()
            .any(|attribute| attribute.eq_ignore_ascii_case(name))
    }

    pub fn to_point(&self, las_point: &las::Point) -> Result<Point, LasError> {
        let mut attributes = Vec::with_capacity(self.standard.len() + self.extra.len());
        attributes.extend(self.standard.iter().map(|dimension| dimension.read(las_point)));
        for dimension in &self.extra {
            attributes.push(dimension.read(&las_point.extra_bytes)?);
        }

        Ok(Point {
            x: las_point.x,
            y: las_point.y,
            z: las_point.z,
            classification: u8::from(las_point.classification),
            synthetic: las_point.is_synthetic,
            attributes,
        })
    }

    /// A zeroed record matching the point format, so the writer accepts it.
    pub fn blank_las_point(&self) -> Result<las::Point, LasError> {
        if self.format.has_waveform {
            return Err(LasError::UnsupportedPointFormat(
                "waveform point formats cannot receive new points".to_string(),
            ));
        }
        Ok(las::Point {
            gps_time: self.format.has_gps_time.then_some(0.0),
            color: self.format.has_color.then(|| Color::new(0, 0, 0)),
            nir: self.format.has_nir.then_some(0),
            extra_bytes: vec![0; self.format.extra_bytes as usize],
            ..Default::default()
        })
    }

    pub fn set_classification(point: &mut las::Point, code: u8) -> Result<(), LasError> {
        point.classification =
            Classification::new(code).map_err(|_| LasError::InvalidClassification(code))?;
        Ok(())
    }

    /// Writes a named attribute into a record built by [`Self::blank_las_point`].
    /// Returns `false` when the layout has no such attribute.
    pub fn set_attribute(
        &self,
        point: &mut las::Point,
        name: &str,
        value: f64,
    ) -> Result<bool, LasError> {
        if let Some(dimension) = self
            .standard
            .iter()
            .find(|dimension| dimension.name().eq_ignore_ascii_case(name))
        {
            dimension.write(point, value);
            return Ok(true);
        }
        if let Some(dimension) = self
            .extra
            .iter()
            .find(|dimension| dimension.name().eq_ignore_ascii_case(name))
        {
            dimension.write(&mut point.extra_bytes, value)?;
            return Ok(true);
        }
        Ok(false)
    }
}
