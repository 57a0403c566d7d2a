pub mod config;
pub mod donor;
pub mod error;
pub mod merge;
pub mod mount;
pub mod occupancy;
pub mod patch;
pub mod resolver;
pub mod selection;
pub mod table;
pub mod tile;
pub mod translation;

pub use config::PatchworkConfig;
pub use error::PatchworkError;
pub use merge::{merge_and_write, MergeOutcome};
pub use occupancy::build_occupancy_grid;
pub use resolver::resolve_complementary_points;
