use std::path::PathBuf;

use pcd_parser::LasError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error(transparent)]
    Layout(#[from] LasError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Failed to persist output file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Dimension '{name}' already exists in {path:?}")]
    DuplicateDimension { name: String, path: PathBuf },

    #[error(
        "Classification {code} does not fit the 5-bit classification of the point format of {path:?}"
    )]
    ClassificationOutOfRange { code: u8, path: PathBuf },

    #[error("Invalid raster {path:?}: {reason}")]
    InvalidRaster { path: PathBuf, reason: String },
}
