pub mod date;
pub mod error;
pub mod progress;

pub use error::UtilError;

pub type Result<T> = std::result::Result<T, UtilError>;
