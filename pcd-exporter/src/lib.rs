pub mod error;
pub mod geotiff;
pub mod las;

pub use error::ExportError;
