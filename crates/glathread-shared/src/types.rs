use serde::{Deserialize, Serialize};

use crate::constants::{REQUEST_ID_PAD, REQUEST_ID_PREFIX};

/// Backend primary key of a work thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub i64);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a thread number in its display form, e.g. `TR-007`.
pub fn request_display_id(thread_number: i64) -> String {
    format!("{REQUEST_ID_PREFIX}{:0>width$}", thread_number, width = REQUEST_ID_PAD)
}

/// Identity of a directory entry or message sender.
///
/// The signed-in viewer and synthesized system events get stable sentinel
/// ids so the directory never depends on which thread was opened first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRef {
    /// The signed-in viewer (`user-current`).
    Current,
    /// Sender of synthesized system events (`system`).
    System,
    /// Any other backend user (`user-<id>`).
    Backend(i64),
}

impl UserRef {
    /// Resolve a backend numeric id against the viewer's identity.
    pub fn from_backend(id: i64, viewer_id: Option<i64>) -> Self {
        if viewer_id == Some(id) {
            Self::Current
        } else {
            Self::Backend(id)
        }
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "user-current"),
            Self::System => write!(f, "system"),
            Self::Backend(id) => write!(f, "user-{id}"),
        }
    }
}

/// User role as reported by the auth endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Supervisor,
    Cfo,
    GateTeam,
    Hod,
    Registrar,
    Administrator,
    Unknown,
}

impl Role {
    /// Parse a backend role string. Unknown values map to [`Role::Unknown`]
    /// rather than failing; parsing is total.
    pub fn parse(s: &str) -> Self {
        match normalize(s).as_str() {
            "supervisor" => Self::Supervisor,
            "cfo" => Self::Cfo,
            "gateteam" | "gate_team" => Self::GateTeam,
            "hod" => Self::Hod,
            "registrar" => Self::Registrar,
            "administrator" | "admin" => Self::Administrator,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Supervisor => "Supervisor",
            Self::Cfo => "CFO",
            Self::GateTeam => "GateTeam",
            Self::Hod => "HOD",
            Self::Registrar => "Registrar",
            Self::Administrator => "Administrator",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a request thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Working,
    WorkCompleted,
    PaymentPending,
    PaymentDone,
    Rejected,
    Overdue,
    #[serde(other)]
    Unknown,
}

impl RequestStatus {
    /// Parse a backend status string. Accepts both snake_case wire values
    /// and the title-case display forms; unknown values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match normalize(s).as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "working" => Self::Working,
            "work_completed" => Self::WorkCompleted,
            "payment_pending" => Self::PaymentPending,
            "payment_done" => Self::PaymentDone,
            "rejected" => Self::Rejected,
            "overdue" => Self::Overdue,
            _ => Self::Unknown,
        }
    }

    /// Whether this status closes the thread's composer. `OPEN -> CLOSED`
    /// is one-way from the client's perspective.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::WorkCompleted | Self::PaymentPending | Self::PaymentDone | Self::Rejected
        )
    }
}

/// Approval state of a request thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ApprovalStatus {
    pub fn parse(s: &str) -> Self {
        match normalize(s).as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        }
    }
}

/// An approver's decision on a pending request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    /// Wire form expected by the approval endpoint.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Kind of a work progress update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Initial,
    Delay,
    Completed,
    #[serde(other)]
    Unknown,
}

impl ProgressKind {
    pub fn parse(s: &str) -> Self {
        match normalize(s).as_str() {
            "initial" => Self::Initial,
            "delay" => Self::Delay,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }
}

/// Direction of a gate pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    In,
    Out,
}

impl PassMode {
    pub fn parse(s: &str) -> Self {
        match normalize(s).as_str() {
            "in" => Self::In,
            _ => Self::Out,
        }
    }
}

/// Kind of an attached media file, as rendered by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Video,
    Voice,
    File,
}

impl FileKind {
    /// Map a backend `message_type` to a render kind. Anything the client
    /// does not recognize degrades to a generic file attachment.
    pub fn from_wire(message_type: &str) -> Self {
        match normalize(message_type).as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Voice,
            _ => Self::File,
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}
