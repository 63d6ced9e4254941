//! Workspace-wide constants and default policy values.

use crate::types::Role;

/// Default interval between background thread snapshot polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Display prefix for request identifiers ("TR-007").
pub const REQUEST_ID_PREFIX: &str = "TR-";

/// Zero-pad width of the numeric part of a display identifier.
pub const REQUEST_ID_PAD: usize = 3;

/// Default backend origin used for local development.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Roles permitted to approve or reject a pending request.
///
/// This is the default policy set; deployments can override it through
/// client configuration. The backend independently enforces authorization,
/// this set only gates what the client surfaces.
pub const DEFAULT_APPROVER_ROLES: [Role; 4] =
    [Role::Hod, Role::Cfo, Role::Registrar, Role::Administrator];
