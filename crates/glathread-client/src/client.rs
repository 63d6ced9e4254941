//! High-level client for one open thread.
//!
//! Ties the HTTP layer, the session and the poll loop together. Every user
//! action follows the same shape: local guards first, then the endpoint
//! call, then the optimistic session application only once the backend has
//! acknowledged. The session lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tokio::sync::mpsc;
use tracing::info;

use glathread_shared::types::{ApprovalDecision, ProgressKind, Role};
use glathread_view::model::{EventId, GatePass, ProgressUpdate, RequestAggregate, User};
use glathread_view::{ApproverPolicy, ThreadViewModelBuilder};

use crate::api::{
    ApiClient, GatePassRequest, ProgressRequest, ReminderRequest, SendMessageRequest,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::ThreadSession;
use crate::sync::{SyncEvent, SyncHandle};

/// Client for a single open thread.
pub struct ThreadClient {
    api: ApiClient,
    thread_id: i64,
    poll_interval: Duration,
    session: Arc<Mutex<ThreadSession>>,
}

impl ThreadClient {
    pub fn new(config: &ClientConfig, token: impl Into<String>, thread_id: i64) -> Self {
        let builder = ThreadViewModelBuilder::new(
            config.base_url.clone(),
            ApproverPolicy::new(config.approver_roles.clone()),
        );
        Self {
            api: ApiClient::new(config.base_url.clone(), token),
            thread_id,
            poll_interval: config.poll_interval,
            session: Arc::new(Mutex::new(ThreadSession::new(builder))),
        }
    }

    /// Initial foreground load: resolve the viewer, then fetch and apply
    /// the first snapshot. Unlike background polls, failures here propagate
    /// so the embedder can show them.
    pub async fn load(&self) -> Result<()> {
        let me = self.api.fetch_current_user().await?;
        self.lock().set_viewer(
            me.user.id,
            me.user.full_name.clone(),
            Role::parse(&me.user.role),
        );

        let snapshot = self.api.fetch_thread_detail(self.thread_id).await?;
        let outcome = self.lock().apply_snapshot(&snapshot);
        info!(thread = self.thread_id, ?outcome, "Thread loaded");
        Ok(())
    }

    /// Start the background poll loop; events arrive on `events`.
    pub fn start_sync(&self, events: mpsc::Sender<SyncEvent>) -> SyncHandle {
        let api = self.api.clone();
        crate::sync::spawn(
            self.thread_id,
            self.poll_interval,
            self.session.clone(),
            events,
            move |id| {
                let api = api.clone();
                async move { api.fetch_thread_detail(id).await }
            },
        )
    }

    /// Send a text message. On acknowledgement an optimistic copy lands in
    /// the timeline under a local id until the next poll echoes it.
    pub async fn send_text(&self, body: &str) -> Result<EventId> {
        self.ensure_open()?;
        self.api
            .send_message(self.thread_id, &SendMessageRequest::text(body))
            .await?;
        self.lock().append_local_text(body)
    }

    /// Approve the request. Visibility of the approval prompt is the view
    /// layer's concern; the backend re-checks authority regardless.
    pub async fn approve(&self) -> Result<()> {
        self.decide(ApprovalDecision::Approved).await
    }

    /// Reject the request.
    pub async fn reject(&self) -> Result<()> {
        self.decide(ApprovalDecision::Rejected).await
    }

    async fn decide(&self, decision: ApprovalDecision) -> Result<()> {
        self.ensure_loaded()?;
        self.api.submit_approval(self.thread_id, decision).await?;
        self.lock().apply_approval(decision)
    }

    /// Set the initial expected completion date.
    pub async fn set_initial_progress(&self, expected_end_date: NaiveDate) -> Result<()> {
        self.send_progress(ProgressKind::Initial, expected_end_date, None)
            .await
    }

    /// Push the expected completion date out, with the reason for the
    /// delay.
    pub async fn report_delay(&self, expected_end_date: NaiveDate, reason: String) -> Result<()> {
        self.send_progress(ProgressKind::Delay, expected_end_date, Some(reason))
            .await
    }

    async fn send_progress(
        &self,
        kind: ProgressKind,
        expected_end_date: NaiveDate,
        delay_reason: Option<String>,
    ) -> Result<()> {
        self.ensure_open()?;
        let response = self
            .api
            .set_progress(
                self.thread_id,
                &ProgressRequest {
                    progress_type: kind,
                    expected_end_date,
                    delay_reason,
                },
            )
            .await?;

        let mut session = self.lock();
        let fallback = session
            .aggregate()
            .map(|a| a.created_at)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let update = ProgressUpdate::from_raw(&response.progress_update, fallback);
        session.apply_progress(update)
    }

    /// Create a gate pass. Rejected locally while another pass still has
    /// its vehicle out.
    pub async fn create_gate_pass(&self, request: GatePassRequest) -> Result<()> {
        {
            let session = self.lock();
            let aggregate = session.aggregate().ok_or(ClientError::NotLoaded)?;
            if aggregate.active_gate_pass().is_some() {
                return Err(ClientError::PassStillOut);
            }
        }

        let response = self.api.create_gate_pass(self.thread_id, &request).await?;

        let mut session = self.lock();
        let viewer_id = session.viewer_id();
        let fallback = session
            .aggregate()
            .map(|a| a.created_at)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let pass = GatePass::from_raw(&response.gate_pass, viewer_id, fallback);
        session.apply_gate_pass(pass)
    }

    /// Mark the vehicle on the given pass back in.
    pub async fn mark_vehicle_in(&self, pass_id: i64) -> Result<()> {
        self.ensure_loaded()?;
        let response = self.api.mark_vehicle_in(pass_id).await?;

        let mut session = self.lock();
        let viewer_id = session.viewer_id();
        let fallback = session
            .aggregate()
            .map(|a| a.created_at)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let pass = GatePass::from_raw(&response.gate_pass, viewer_id, fallback);
        session.apply_vehicle_in(pass)
    }

    /// Mark the request's work finished. One-way; the composer closes.
    pub async fn mark_completed(&self) -> Result<()> {
        self.ensure_open()?;
        self.api.mark_completed(self.thread_id).await?;
        self.lock().apply_completed()
    }

    /// Schedule a reminder on this thread. The message is validated
    /// locally before the endpoint is called.
    pub async fn set_reminder(&self, reminder_at: NaiveDateTime, message: String) -> Result<()> {
        if message.trim().is_empty() {
            return Err(ClientError::EmptyField("reminder message"));
        }
        self.ensure_loaded()?;
        self.api
            .set_reminder(&ReminderRequest {
                work_thread: self.thread_id,
                reminder_at,
                message,
            })
            .await?;
        Ok(())
    }

    /// Snapshot of the current aggregate, cloned out of the session.
    pub fn aggregate(&self) -> Option<RequestAggregate> {
        self.lock().aggregate().cloned()
    }

    /// Snapshot of the current user directory.
    pub fn users(&self) -> Vec<User> {
        self.lock().users().to_vec()
    }

    /// Shared session handle, for embedders that drive the poll loop
    /// themselves.
    pub fn session(&self) -> Arc<Mutex<ThreadSession>> {
        self.session.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ThreadSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_loaded(&self) -> Result<()> {
        let session = self.lock();
        session.aggregate().ok_or(ClientError::NotLoaded)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        let session = self.lock();
        let aggregate = session.aggregate().ok_or(ClientError::NotLoaded)?;
        if !aggregate.composer_open() {
            return Err(ClientError::ThreadClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Guards run before any network call, so they are testable without a
    // backend.
    #[tokio::test]
    async fn test_actions_require_a_loaded_thread() {
        let client = ThreadClient::new(&ClientConfig::default(), "token", 7);
        assert!(matches!(
            client.send_text("hello").await,
            Err(ClientError::NotLoaded)
        ));
        assert!(matches!(client.approve().await, Err(ClientError::NotLoaded)));
        assert!(matches!(
            client.mark_completed().await,
            Err(ClientError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_blank_reminder_message_is_rejected_locally() {
        let client = ThreadClient::new(&ClientConfig::default(), "token", 7);
        let at = chrono::NaiveDate::from_ymd_opt(2024, 8, 2)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert!(matches!(
            client.set_reminder(at, "   ".into()).await,
            Err(ClientError::EmptyField("reminder message"))
        ));
    }
}
