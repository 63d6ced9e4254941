//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can run with zero
//! configuration against a local development backend.

use std::time::Duration;

use glathread_shared::constants::{
    DEFAULT_APPROVER_ROLES, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_SECS,
};
use glathread_shared::types::Role;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin all API and media paths resolve against.
    /// Env: `GLATHREAD_BASE_URL`
    /// Default: `http://127.0.0.1:8000`
    pub base_url: String,

    /// Interval between background snapshot polls while a thread is open.
    /// Env: `GLATHREAD_POLL_INTERVAL_SECS`
    /// Default: 5 seconds.
    pub poll_interval: Duration,

    /// Roles allowed to see the approval prompt, comma-separated.
    /// Env: `GLATHREAD_APPROVER_ROLES`
    /// Default: `HOD,CFO,Registrar,Administrator`
    pub approver_roles: Vec<Role>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            approver_roles: DEFAULT_APPROVER_ROLES.to_vec(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Invalid values are logged and skipped, never fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("GLATHREAD_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        if let Ok(val) = std::env::var("GLATHREAD_POLL_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.poll_interval = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid GLATHREAD_POLL_INTERVAL_SECS, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("GLATHREAD_APPROVER_ROLES") {
            let roles = parse_role_list(&val);
            if roles.is_empty() {
                tracing::warn!(value = %val, "No valid roles in GLATHREAD_APPROVER_ROLES, using default");
            } else {
                config.approver_roles = roles;
            }
        }

        config
    }
}

/// Parse a comma-separated role list; unrecognized entries are logged and
/// skipped.
fn parse_role_list(raw: &str) -> Vec<Role> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Role::parse(s) {
            Role::Unknown => {
                tracing::warn!(role = %s, "Skipping unrecognized approver role");
                None
            }
            role => Some(role),
        })
        .collect()
}
