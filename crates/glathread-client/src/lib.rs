//! GLAThread client runtime.
//!
//! Everything an embedding UI shell needs to open a transport request
//! thread: authenticated HTTP access, per-thread session state with
//! optimistic updates, and a background poll loop that keeps the session
//! converged with the backend.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod sync;

pub use api::ApiClient;
pub use client::ThreadClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::{SnapshotOutcome, ThreadSession};
pub use sync::{SyncEvent, SyncHandle};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` takes precedence;
/// the fallback keeps the client crates chatty and everything else quiet.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("glathread_client=debug,glathread_view=debug,glathread_shared=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
