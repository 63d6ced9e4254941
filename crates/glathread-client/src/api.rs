//! HTTP client for the GLAThread backend.
//!
//! Thin wrapper over `reqwest` with bearer-token auth. The snapshot
//! endpoint returns the verbatim JSON value so the view layer can retain
//! it for diffing; everything else decodes into typed envelopes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use glathread_shared::snapshot::{
    DashboardCounts, MeResponse, RawGatePass, RawProgressUpdate, RequestCategory,
};
use glathread_shared::types::{ApprovalDecision, ProgressKind};

use crate::error::{ClientError, Result};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of `POST /api/threads/{id}/messages/`. File uploads go through the
/// media pipeline, which is outside this crate; only text bodies are sent
/// from here.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub message_type: String,
    pub text_message: String,
}

impl SendMessageRequest {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            message_type: "text".to_string(),
            text_message: body.into(),
        }
    }
}

/// Body of `POST /api/threads/{id}/approval/`.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub action: ApprovalDecision,
}

/// Body of `POST /api/threads/{id}/progress/`.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressRequest {
    pub progress_type: ProgressKind,
    pub expected_end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_reason: Option<String>,
}

/// Body of `POST /api/threads/{id}/gate-pass/`.
#[derive(Debug, Clone, Serialize)]
pub struct GatePassRequest {
    pub issued_to: i64,
    pub vehicle_number: String,
    pub purpose: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

/// Body of `POST /api/reminders/`. `reminder_at` is a naive local
/// date-time, matching what the backend expects.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderRequest {
    pub work_thread: i64,
    pub reminder_at: NaiveDateTime,
    pub message: String,
}

/// Body of `POST /api/threads/create/`. Document uploads accompany the
/// form out-of-band; only the named slots travel here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewThreadRequest {
    pub request_category: i64,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_1_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_2_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_3_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_4_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// Generic acknowledgement for mutations with no echoed record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// Response of thread creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatedThread {
    pub id: i64,
    pub thread_number: i64,
}

/// Response of setting progress; echoes the created record so the session
/// can apply it optimistically under its server id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressResponse {
    pub success: bool,
    pub progress_update: RawProgressUpdate,
}

/// Response of gate pass creation and the mark-in transition; echoes the
/// (updated) pass record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatePassResponse {
    pub success: bool,
    pub gate_pass: RawGatePass,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated HTTP client. Cheap to clone; the underlying connection
/// pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// `base_url` is the backend origin; a trailing slash is tolerated.
    /// `token` is the session bearer token (storage is the embedder's
    /// concern).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        }
    }

    /// `GET /api/auth/me/`, the authenticated session's user descriptor.
    pub async fn fetch_current_user(&self) -> Result<MeResponse> {
        self.get_json("/api/auth/me/").await
    }

    /// `GET /api/threads/{id}/full-detail/`. Returns the raw snapshot
    /// verbatim so the view layer can retain and diff it.
    pub async fn fetch_thread_detail(&self, thread_id: i64) -> Result<Value> {
        debug!(thread = thread_id, "Fetching thread snapshot");
        self.get_json(&format!("/api/threads/{thread_id}/full-detail/"))
            .await
    }

    /// `POST /api/threads/create/`.
    pub async fn create_thread(&self, request: &NewThreadRequest) -> Result<CreatedThread> {
        self.post_json("/api/threads/create/", request).await
    }

    /// `POST /api/threads/{id}/messages/`.
    pub async fn send_message(
        &self,
        thread_id: i64,
        request: &SendMessageRequest,
    ) -> Result<ActionResponse> {
        self.post_json(&format!("/api/threads/{thread_id}/messages/"), request)
            .await
    }

    /// `POST /api/threads/{id}/approval/`.
    pub async fn submit_approval(
        &self,
        thread_id: i64,
        decision: ApprovalDecision,
    ) -> Result<ActionResponse> {
        debug!(thread = thread_id, action = decision.as_wire(), "Submitting approval decision");
        self.post_json(
            &format!("/api/threads/{thread_id}/approval/"),
            &ApprovalRequest { action: decision },
        )
        .await
    }

    /// `POST /api/threads/{id}/progress/`.
    pub async fn set_progress(
        &self,
        thread_id: i64,
        request: &ProgressRequest,
    ) -> Result<ProgressResponse> {
        self.post_json(&format!("/api/threads/{thread_id}/progress/"), request)
            .await
    }

    /// `POST /api/threads/{id}/gate-pass/`.
    pub async fn create_gate_pass(
        &self,
        thread_id: i64,
        request: &GatePassRequest,
    ) -> Result<GatePassResponse> {
        self.post_json(&format!("/api/threads/{thread_id}/gate-pass/"), request)
            .await
    }

    /// `POST /api/gate-passes/{id}/mark-in/`.
    pub async fn mark_vehicle_in(&self, pass_id: i64) -> Result<GatePassResponse> {
        self.post_json(&format!("/api/gate-passes/{pass_id}/mark-in/"), &Value::Null)
            .await
    }

    /// `POST /api/threads/{id}/mark-completed/`.
    pub async fn mark_completed(&self, thread_id: i64) -> Result<ActionResponse> {
        self.post_json(&format!("/api/threads/{thread_id}/mark-completed/"), &Value::Null)
            .await
    }

    /// `POST /api/reminders/`.
    pub async fn set_reminder(&self, request: &ReminderRequest) -> Result<ActionResponse> {
        self.post_json("/api/reminders/", request).await
    }

    /// `GET /api/dashboard-counts/`.
    pub async fn fetch_dashboard_counts(&self) -> Result<DashboardCounts> {
        self.get_json("/api/dashboard-counts/").await
    }

    /// `GET /api/request-categories`.
    pub async fn fetch_request_categories(&self) -> Result<Vec<RequestCategory>> {
        self.get_json("/api/request-categories").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(ClientError::Backend {
                status: status.as_u16(),
                message: backend_message(&body),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

/// Pull a human-readable message out of a backend error body.
fn backend_message(body: &Value) -> String {
    body.get("detail")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "request rejected".to_string())
}
