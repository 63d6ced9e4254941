use thiserror::Error;

/// Errors produced while decoding a backend snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot JSON did not match the expected thread shape.
    #[error("Snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A timestamp field could not be parsed.
    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SnapshotError>;
