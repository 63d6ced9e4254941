pub mod constants;
pub mod error;
pub mod snapshot;
pub mod types;

pub use error::{Result, SnapshotError};
