//! Wire shapes of the backend thread snapshot and auth endpoints.
//!
//! The snapshot is consumed, not owned: every nested collection and
//! optional field carries `#[serde(default)]` so a missing or malformed
//! field degrades to empty instead of failing the whole decode. Timestamps
//! arrive as strings and are parsed by the view layer with explicit
//! fallbacks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SnapshotError};

/// Envelope returned by `GET /api/threads/{id}/full-detail/`.
///
/// A `None` thread means "not loaded yet" and is never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThreadDetail {
    pub success: bool,
    pub message: Option<String>,
    pub thread: Option<RawThread>,
}

impl ThreadDetail {
    /// Decode a raw snapshot value into the typed envelope.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(SnapshotError::Decode)
    }
}

/// The full nested thread object as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawThread {
    pub id: i64,
    pub thread_number: i64,
    pub title: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub request_category_name: String,
    pub status: String,
    pub approval_status: String,
    pub created_by: i64,
    pub created_by_name: String,
    pub approved_by: Option<i64>,
    pub approved_by_name: Option<String>,
    pub approval_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub description: Option<String>,

    pub document_1_name: Option<String>,
    pub document_1_file: Option<String>,
    pub document_2_name: Option<String>,
    pub document_2_file: Option<String>,
    pub document_3_name: Option<String>,
    pub document_3_file: Option<String>,
    pub document_4_name: Option<String>,
    pub document_4_file: Option<String>,

    pub messages: Vec<RawMessage>,
    pub progress_updates: Vec<RawProgressUpdate>,
    pub gate_passes: Vec<RawGatePass>,
}

impl RawThread {
    /// The four optional named-document slots, in slot order.
    pub fn document_slots(&self) -> [(&Option<String>, &Option<String>); 4] {
        [
            (&self.document_1_name, &self.document_1_file),
            (&self.document_2_name, &self.document_2_file),
            (&self.document_3_name, &self.document_3_file),
            (&self.document_4_name, &self.document_4_file),
        ]
    }
}

/// One chat message inside a thread snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawMessage {
    pub id: i64,
    pub sender: i64,
    pub sender_name: String,
    pub message_type: String,
    pub text_message: Option<String>,
    pub media_file: Option<String>,
    pub created_at: String,
}

/// One work progress record inside a thread snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawProgressUpdate {
    pub id: i64,
    pub progress_type: String,
    pub expected_end_date: String,
    pub delay_reason: Option<String>,
    pub updated_by: i64,
    pub updated_by_name: String,
    pub created_at: String,
}

/// One gate pass record inside a thread snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawGatePass {
    pub id: i64,
    pub issued_to: i64,
    pub issued_to_name: String,
    pub vehicle_number: String,
    pub purpose: String,
    pub valid_from: String,
    pub valid_to: String,
    pub status: String,
    pub pass_mode: String,
    pub out_time: Option<String>,
    pub in_time: Option<String>,
    pub created_at: String,
}

/// Envelope returned by `GET /api/auth/me/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeResponse {
    pub user: CurrentUser,
}

/// The authenticated session's user descriptor. The role reported here is
/// authoritative and is never overwritten by role data derived from thread
/// snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurrentUser {
    pub id: i64,
    pub full_name: String,
    pub role: String,
}

/// Per-status totals returned by `GET /api/dashboard-counts/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardCounts {
    pub total_requests: i64,
    pub pending: i64,
    pub working: i64,
    pub work_completed: i64,
    pub payment_pending: i64,
    pub payment_done: i64,
    pub rejected: i64,
    pub overdue: OverdueCounts,
}

/// Overdue bucket of the dashboard counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverdueCounts {
    pub count: i64,
}

/// One selectable request category from `GET /api/request-categories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RequestCategory {
    pub id: i64,
    pub name: String,
}

/// Strictly parse a backend timestamp.
///
/// Accepts RFC 3339 date-times and bare `YYYY-MM-DD` dates (the backend
/// sends the latter for expected completion dates), the date form resolving
/// to midnight UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = s.parse::<NaiveDate>().map_err(SnapshotError::Timestamp)?;
    // NaiveDate always has a valid midnight.
    Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

/// Lossy timestamp parse used while projecting snapshots: a malformed field
/// never aborts a build, it falls back to the supplied timestamp.
pub fn parse_timestamp_or(s: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match parse_timestamp(s) {
        Ok(ts) => ts,
        Err(e) => {
            debug!(value = %s, error = %e, "Falling back on malformed timestamp");
            fallback
        }
    }
}
