//! View-model structs handed to the rendering layer.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be passed
//! directly to a UI shell over IPC or re-rendered from a cached copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use glathread_shared::snapshot::{
    parse_timestamp, parse_timestamp_or, RawGatePass, RawProgressUpdate,
};
use glathread_shared::types::{
    ApprovalStatus, FileKind, PassMode, ProgressKind, RequestStatus, Role, ThreadId, UserRef,
};

// ---------------------------------------------------------------------------
// User directory
// ---------------------------------------------------------------------------

/// One entry of the per-session user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Stable identity; unique within one directory.
    pub id: UserRef,
    /// Human-readable display name, refreshed from the latest snapshot.
    pub display_name: String,
    /// Optional avatar reference (resolution is a UI concern).
    pub avatar_ref: Option<String>,
    /// Role. For the viewer this is sourced once from the auth endpoint and
    /// never overwritten by thread-derived data.
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A named document attached to the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Progress updates
// ---------------------------------------------------------------------------

/// A work progress record: expected completion date, optionally explaining
/// a delay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub id: i64,
    pub kind: ProgressKind,
    pub expected_end_date: DateTime<Utc>,
    pub delay_reason: Option<String>,
    pub updated_by_name: String,
    pub created_at: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Project a raw snapshot record. Malformed timestamps fall back to the
    /// supplied thread creation time rather than aborting the build.
    pub fn from_raw(raw: &RawProgressUpdate, fallback: DateTime<Utc>) -> Self {
        Self {
            id: raw.id,
            kind: ProgressKind::parse(&raw.progress_type),
            expected_end_date: parse_timestamp_or(&raw.expected_end_date, fallback),
            delay_reason: raw.delay_reason.clone().filter(|r| !r.is_empty()),
            updated_by_name: raw.updated_by_name.clone(),
            created_at: parse_timestamp_or(&raw.created_at, fallback),
        }
    }
}

// ---------------------------------------------------------------------------
// Gate passes
// ---------------------------------------------------------------------------

/// A record authorizing a vehicle to exit and later return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatePass {
    pub id: i64,
    pub issued_to: UserRef,
    pub issued_to_name: String,
    pub vehicle_number: String,
    pub purpose: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub status: String,
    pub pass_mode: PassMode,
    pub out_time: Option<DateTime<Utc>>,
    pub in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GatePass {
    pub fn from_raw(raw: &RawGatePass, viewer_id: Option<i64>, fallback: DateTime<Utc>) -> Self {
        Self {
            id: raw.id,
            issued_to: UserRef::from_backend(raw.issued_to, viewer_id),
            issued_to_name: raw.issued_to_name.clone(),
            vehicle_number: raw.vehicle_number.clone(),
            purpose: raw.purpose.clone(),
            valid_from: parse_timestamp_or(&raw.valid_from, fallback),
            valid_to: parse_timestamp_or(&raw.valid_to, fallback),
            status: raw.status.clone(),
            pass_mode: PassMode::parse(&raw.pass_mode),
            out_time: raw.out_time.as_deref().and_then(|t| parse_timestamp(t).ok()),
            in_time: raw.in_time.as_deref().and_then(|t| parse_timestamp(t).ok()),
            created_at: parse_timestamp_or(&raw.created_at, fallback),
        }
    }

    /// A pass is active while the vehicle is out and has not yet returned.
    /// At most one pass per thread is active at a time.
    pub fn is_active(&self) -> bool {
        self.out_time.is_some() && self.in_time.is_none()
    }
}

// ---------------------------------------------------------------------------
// Timeline events
// ---------------------------------------------------------------------------

/// Stable event identity, derived from the source record type and id.
///
/// The tag keeps ids from ever colliding across kinds: a message and a
/// progress update with the same numeric id are still distinct events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventId {
    /// A server-confirmed chat message.
    Message(i64),
    /// The synthesized request-details header (tagged by thread id).
    DetailsHeader(i64),
    /// The synthesized approval prompt (tagged by thread id).
    ApprovalPrompt(i64),
    /// A progress update record.
    Progress(i64),
    /// Gate pass creation.
    PassCreated(i64),
    /// Vehicle marked out on a gate pass.
    PassExited(i64),
    /// Vehicle marked back in on a gate pass.
    PassReturned(i64),
    /// A locally-minted optimistic event not yet confirmed by the server.
    Local(Uuid),
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(id) => write!(f, "msg-{id}"),
            Self::DetailsHeader(id) => write!(f, "msg-{id}-details"),
            Self::ApprovalPrompt(id) => write!(f, "msg-{id}-approval"),
            Self::Progress(id) => write!(f, "progress-{id}"),
            Self::PassCreated(id) => write!(f, "gatepass-details-{id}"),
            Self::PassExited(id) => write!(f, "gatepass-out-{id}"),
            Self::PassReturned(id) => write!(f, "gatepass-in-{id}"),
            Self::Local(id) => write!(f, "local-{id}"),
        }
    }
}

/// Payload of a timeline event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EventKind {
    /// A plain text chat message.
    Text { body: String },
    /// A media/file attachment, optionally captioned.
    File {
        file_name: String,
        file_url: String,
        file_kind: FileKind,
        caption: Option<String>,
    },
    /// The always-first request details header.
    DetailsHeader,
    /// Approval prompt, present only while approval is pending and the
    /// viewer holds an approver role.
    ApprovalPrompt,
    /// A progress update card.
    Progress(ProgressUpdate),
    /// Gate pass lifecycle cards. One pass record fans out into up to
    /// three events.
    PassCreated(GatePass),
    PassExited(GatePass),
    PassReturned(GatePass),
}

/// One entry of the thread timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub id: EventId,
    /// Display id of the owning request ("TR-007").
    pub request_id: String,
    /// `UserRef::System` for all synthesized kinds.
    pub sender: UserRef,
    pub timestamp: DateTime<Utc>,
    pub seen: bool,
    pub kind: EventKind,
}

impl TimelineEvent {
    /// Text body, for chat messages only.
    pub fn text_body(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text { body } => Some(body),
            _ => None,
        }
    }

    /// Whether this event was synthesized client-side from snapshot data
    /// rather than being a real chat message.
    pub fn is_synthetic(&self) -> bool {
        !matches!(self.kind, EventKind::Text { .. } | EventKind::File { .. })
    }
}

// ---------------------------------------------------------------------------
// Request aggregate
// ---------------------------------------------------------------------------

/// Normalized view of one backend thread, owned by the view layer holding
/// the currently open thread and dropped on navigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestAggregate {
    pub thread_id: ThreadId,
    /// Display form, e.g. "TR-007".
    pub display_id: String,
    pub title: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub request_category: String,
    pub status: RequestStatus,
    pub approval_status: ApprovalStatus,
    pub created_by: UserRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub description: String,
    pub approved_by: Option<UserRef>,
    pub approval_at: Option<DateTime<Utc>>,
    pub documents: Vec<Document>,
    pub progress_updates: Vec<ProgressUpdate>,
    pub gate_passes: Vec<GatePass>,
    pub timeline: Vec<TimelineEvent>,
    /// The untouched backend thread object, kept verbatim so fields not
    /// yet modeled stay readable and incremental merges can diff cheaply.
    pub raw: serde_json::Value,
}

impl RequestAggregate {
    /// "Innova Crysta - MH14-CD5678" style one-liner for headers.
    pub fn vehicle_details(&self) -> String {
        format!("{} - {}", self.vehicle_type, self.vehicle_number)
    }

    /// Whether the composer accepts new messages. One-way: once a closing
    /// status is observed there is no client-side path back to open.
    pub fn composer_open(&self) -> bool {
        !self.status.is_closed()
    }

    /// The pass whose vehicle is currently out, if any.
    pub fn active_gate_pass(&self) -> Option<&GatePass> {
        self.gate_passes.iter().rev().find(|p| p.is_active())
    }

    /// The single initial progress update, when one has been set.
    pub fn initial_progress(&self) -> Option<&ProgressUpdate> {
        self.progress_updates
            .iter()
            .find(|p| p.kind == ProgressKind::Initial)
    }

    /// The most recently created progress update.
    pub fn latest_progress(&self) -> Option<&ProgressUpdate> {
        self.progress_updates.iter().max_by_key(|p| p.created_at)
    }

    /// An approved request needs an initial time limit before work can be
    /// tracked.
    pub fn needs_time_limit(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
            && !self.status.is_closed()
            && self.initial_progress().is_none()
    }

    /// Overdue is derived, never stored: the latest expected end date has
    /// passed and the thread is still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.latest_progress() {
            Some(p) => now > p.expected_end_date && !self.status.is_closed(),
            None => false,
        }
    }
}
