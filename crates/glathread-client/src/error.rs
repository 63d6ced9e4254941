use thiserror::Error;

/// Errors produced by the client layer.
///
/// Taxonomy: transport and auth failures come from the HTTP layer; backend
/// rejections carry the status and any `detail`/`message` the server sent;
/// the guard variants (`ThreadClosed`, `PassStillOut`, `NotLoaded`) reject
/// user actions before any network call so local state is never mutated on
/// a failed action.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session token was missing, expired or rejected.
    #[error("Unauthorized: session expired or invalid")]
    Unauthorized,

    /// The backend rejected the request.
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A response body did not decode.
    #[error("Response decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// The thread is in a closed status; composition is disabled.
    #[error("Thread is closed; no further messages or actions are accepted")]
    ThreadClosed,

    /// A gate pass is still out; only one pass may be active at a time.
    #[error("A gate pass is still active; mark the vehicle in first")]
    PassStillOut,

    /// No aggregate has been loaded into the session yet.
    #[error("Thread not loaded")]
    NotLoaded,

    /// A user-supplied field failed local validation.
    #[error("Invalid {0}: value is empty")]
    EmptyField(&'static str),

    /// Snapshot decode failure surfaced from the shared layer.
    #[error(transparent)]
    Snapshot(#[from] glathread_shared::SnapshotError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
