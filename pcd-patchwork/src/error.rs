use std::path::{Path, PathBuf};

use pcd_exporter::ExportError;
use pcd_parser::LasError;

use crate::tile::TileOrigin;

#[derive(Debug, thiserror::Error)]
pub enum PatchworkError {
    #[error("No points in {} to determine the coordinate of the tile", describe(.0))]
    EmptyInput(Option<PathBuf>),

    #[error(
        "Min values (x={x_min}, y={y_min}) do not belong to the same tile as max values (x={x_max}, y={y_max})"
    )]
    TileSpan {
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
    },

    #[error(
        "Donor tile {donor} of {} does not match recipient tile {recipient} of {}",
        describe(.donor_path),
        describe(.recipient_path)
    )]
    TileMismatch {
        recipient: TileOrigin,
        donor: TileOrigin,
        recipient_path: Option<PathBuf>,
        donor_path: Option<PathBuf>,
    },

    #[error("Point (x={x}, y={y}) lies outside the tile {origin}")]
    OutsideTile { x: f64, y: f64, origin: TileOrigin },

    #[error("Missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("No virtual classification for donor class {0}")]
    UnknownClassification(u8),

    #[error("Column '{name}' already exists in {path:?}")]
    DuplicateColumn { name: String, path: PathBuf },

    #[error("{0} is not a valid column size, expected 8, 16, 32 or 64")]
    InvalidColumnSize(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Several donor files match {key}: {candidates:?}")]
    AmbiguousDonor {
        key: String,
        candidates: Vec<PathBuf>,
    },

    #[error("No donor file for {0}")]
    DonorNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Las(#[from] LasError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

fn describe(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(Path::display)
        .map_or_else(|| "an in-memory cloud".to_string(), |path| path.to_string())
}

impl PatchworkError {
    /// Errors that repeat until the configuration changes.
    /// The others depend on the input files and their pairing.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAttribute(_)
                | Self::UnknownClassification(_)
                | Self::DuplicateColumn { .. }
                | Self::InvalidColumnSize(_)
                | Self::InvalidConfig(_)
                | Self::Json(_)
                | Self::Pattern(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(PatchworkError::InvalidColumnSize(7).is_configuration_error());
        assert!(PatchworkError::UnknownClassification(3).is_configuration_error());
        assert!(!PatchworkError::EmptyInput(None).is_configuration_error());
        assert!(!PatchworkError::DonorNotFound("673_6362".to_string()).is_configuration_error());

        let mismatch = PatchworkError::TileMismatch {
            recipient: TileOrigin::new(1000.0, 3000.0),
            donor: TileOrigin::new(2000.0, 3000.0),
            recipient_path: Some(PathBuf::from("/data/recipient.las")),
            donor_path: Some(PathBuf::from("/data/donor.las")),
        };
        assert!(!mismatch.is_configuration_error());
        assert_eq!(
            mismatch.to_string(),
            "Donor tile (2000, 3000) of /data/donor.las does not match recipient tile (1000, 3000) of /data/recipient.las"
        );
    }

    #[test]
    fn test_messages_without_path() {
        assert_eq!(
            PatchworkError::EmptyInput(None).to_string(),
            "No points in an in-memory cloud to determine the coordinate of the tile"
        );
        assert_eq!(
            PatchworkError::EmptyInput(Some(PathBuf::from("tile.las"))).to_string(),
            "No points in tile.las to determine the coordinate of the tile"
        );
    }
}
