use std::path::Path;

use pcd_core::pointcloud::point::PointCloud;

use crate::error::LasError;

pub mod las;

pub trait Parser {
    fn parse(&self) -> Result<PointCloud, LasError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Las,
    Laz,
}

pub fn get_extension(path: &Path) -> Result<Extension, LasError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    match extension.as_deref() {
        Some("las") => Ok(Extension::Las),
        Some("laz") => Ok(Extension::Laz),
        _ => Err(LasError::UnsupportedExtension(path.to_path_buf())),
    }
}

/// Reads a whole LAS/LAZ file into memory.
pub fn read_point_cloud(path: &Path) -> Result<PointCloud, LasError> {
    get_extension(path)?;
    las::LasParser::new(path).parse()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_get_extension() {
        assert_eq!(
            get_extension(&PathBuf::from("tile_0673_6362.LAZ")).unwrap(),
            Extension::Laz
        );
        assert_eq!(
            get_extension(&PathBuf::from("dir/tile.las")).unwrap(),
            Extension::Las
        );
        assert!(matches!(
            get_extension(&PathBuf::from("points.csv")),
            Err(LasError::UnsupportedExtension(_))
        ));
        assert!(get_extension(&PathBuf::from("no_extension")).is_err());
    }
}
