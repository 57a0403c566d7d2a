pub mod error;
pub mod extra_bytes;
pub mod layout;
pub mod parsers;

pub use error::LasError;
