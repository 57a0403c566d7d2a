use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use glob::{glob, Pattern};

use crate::{config::MountPoint, error::PatchworkError, mount::mounted_path, tile::TileOrigin};

pub const RECIPIENT_FILE_KEY: &str = "recipient_file";
pub const DONOR_FILE_KEY: &str = "donor_file";

/// Finds the donor file paired with a recipient tile.
pub trait DonorLocator {
    /// `Ok(None)` when the recipient legitimately has no donor.
    fn locate(
        &self,
        recipient_path: &Path,
        tile_origin: TileOrigin,
    ) -> Result<Option<PathBuf>, PatchworkError>;
}

/// Matching table with `recipient_file` and `donor_file` columns.
pub struct CsvDonorLocator {
    pub csv_path: PathBuf,
    pub mount_points: Vec<MountPoint>,
}

impl CsvDonorLocator {
    pub fn new(csv_path: &Path, mount_points: &[MountPoint]) -> Self {
        Self {
            csv_path: csv_path.to_path_buf(),
            mount_points: mount_points.to_vec(),
        }
    }
}

impl DonorLocator for CsvDonorLocator {
    fn locate(
        &self,
        recipient_path: &Path,
        _tile_origin: TileOrigin,
    ) -> Result<Option<PathBuf>, PatchworkError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.csv_path)?;

        let headers = reader.headers()?.clone();
        let column = |key: &str| {
            headers
                .iter()
                .position(|header| header.trim() == key)
                .ok_or_else(|| {
                    PatchworkError::InvalidConfig(format!(
                        "{:?} has no '{}' column",
                        self.csv_path, key
                    ))
                })
        };
        let (recipient_column, donor_column) =
            (column(RECIPIENT_FILE_KEY)?, column(DONOR_FILE_KEY)?);

        let mut candidates = Vec::new();
        for record in reader.records() {
            let record = record?;
            let recipient = record.get(recipient_column).unwrap_or_default();
            if recipient.is_empty()
                || mounted_path(recipient, &self.mount_points) != recipient_path
            {
                continue;
            }
            candidates.push(record.get(donor_column).unwrap_or_default().to_string());
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [donor] if donor.is_empty() => Ok(None),
            [donor] => Ok(Some(mounted_path(donor, &self.mount_points))),
            _ => Err(PatchworkError::AmbiguousDonor {
                key: recipient_path.display().to_string(),
                candidates: candidates.iter().map(PathBuf::from).collect(),
            }),
        }
    }
}

/// Looks for `*{x}_{y}*.la[sz]` in `<root>/<subdirectory>`, where `x` and `y`
/// are the tile origin divided by `tile_coordinate_factor`.
pub struct DirectoryDonorLocator {
    pub root: PathBuf,
    pub subdirectory: Option<String>,
    pub tile_coordinate_factor: f64,
}

impl DirectoryDonorLocator {
    pub fn directory(&self) -> PathBuf {
        match &self.subdirectory {
            Some(subdirectory) => self.root.join(subdirectory),
            None => self.root.clone(),
        }
    }
}

impl DonorLocator for DirectoryDonorLocator {
    fn locate(
        &self,
        _recipient_path: &Path,
        tile_origin: TileOrigin,
    ) -> Result<Option<PathBuf>, PatchworkError> {
        let directory = self.directory();
        let (x, y) = tile_origin.tile_coordinates(self.tile_coordinate_factor);
        let key = format!("{}_{}", x, y);
        if !directory.is_dir() {
            return Err(PatchworkError::DonorNotFound(format!(
                "{} ({:?} is not a directory)",
                key, directory
            )));
        }

        let pattern = format!(
            "{}/*{}*.la[sz]",
            Pattern::escape(&directory.to_string_lossy()),
            key
        );
        let mut candidates = Vec::new();
        for entry in glob(&pattern)? {
            candidates.push(entry.map_err(|error| error.into_error())?);
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(PatchworkError::DonorNotFound(format!("{} in {:?}", key, directory))),
            1 => Ok(candidates.pop()),
            _ => Err(PatchworkError::AmbiguousDonor { key, candidates }),
        }
    }
}
