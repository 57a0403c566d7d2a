use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("Unsupported file extension for {0}")]
    UnsupportedExtension(PathBuf),

    #[error("Unsupported extra bytes data type {data_type} for dimension '{name}'")]
    UnsupportedExtraBytesType { name: String, data_type: u8 },

    #[error("Malformed extra bytes record: {0}")]
    MalformedExtraBytes(String),

    #[error("Unsupported point format: {0}")]
    UnsupportedPointFormat(String),

    #[error("Invalid classification {0}")]
    InvalidClassification(u8),
}
