//! Per-thread session state.
//!
//! Owns the current aggregate, the user directory and the viewer identity,
//! and funnels every change through one of two doors: snapshot ingestion
//! (authoritative, from the poll loop) or optimistic local application
//! (after a mutation endpoint acknowledged). Both doors preserve the
//! timeline merge rules, so re-applying an identical snapshot never moves
//! anything.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use glathread_shared::types::{
    ApprovalDecision, ApprovalStatus, FileKind, RequestStatus, UserRef,
};
use glathread_view::model::{
    EventId, EventKind, GatePass, ProgressUpdate, RequestAggregate, TimelineEvent, User,
};
use glathread_view::timeline::{gate_pass_events, merge_timeline, progress_event, sort_events};
use glathread_view::ThreadViewModelBuilder;

use crate::error::{ClientError, Result};

/// What a snapshot ingestion did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The snapshot carried no thread; existing state was left alone.
    NotLoaded,
    /// The snapshot was byte-identical to the one already applied.
    Unchanged,
    /// The aggregate was rebuilt and merged.
    Updated,
}

/// Session state for one open thread.
pub struct ThreadSession {
    builder: ThreadViewModelBuilder,
    aggregate: Option<RequestAggregate>,
    users: Vec<User>,
    viewer_id: Option<i64>,
}

impl ThreadSession {
    pub fn new(builder: ThreadViewModelBuilder) -> Self {
        Self {
            builder,
            aggregate: None,
            users: Vec::new(),
            viewer_id: None,
        }
    }

    /// Seed the viewer's directory entry from the auth endpoint. This is
    /// the only place the viewer's role is ever set; snapshot data can
    /// refresh the display name but never the role.
    pub fn set_viewer(&mut self, id: i64, display_name: impl Into<String>, role: glathread_shared::types::Role) {
        self.viewer_id = Some(id);
        let entry = User {
            id: UserRef::Current,
            display_name: display_name.into(),
            avatar_ref: None,
            role,
        };
        match self.users.iter_mut().find(|u| u.id == UserRef::Current) {
            Some(existing) => *existing = entry,
            None => self.users.push(entry),
        }
        // A changed viewer can change what the build synthesizes (the
        // approval prompt in particular), so the unchanged-snapshot
        // short-circuit must not skip the next rebuild.
        if let Some(aggregate) = &mut self.aggregate {
            aggregate.raw = Value::Null;
        }
    }

    pub fn viewer_id(&self) -> Option<i64> {
        self.viewer_id
    }

    pub fn aggregate(&self) -> Option<&RequestAggregate> {
        self.aggregate.as_ref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Ingest one snapshot from the backend.
    ///
    /// An unchanged raw thread short-circuits before any rebuild. A rebuilt
    /// aggregate has its timeline merged with the local one so optimistic
    /// events the server has not echoed yet survive the poll.
    pub fn apply_snapshot(&mut self, snapshot: &Value) -> SnapshotOutcome {
        if let Some(current) = &self.aggregate {
            if snapshot.get("thread") == Some(&current.raw) {
                return SnapshotOutcome::Unchanged;
            }
        }

        let (built, users) = self.builder.build(snapshot, &self.users, self.viewer_id);
        self.users = users;

        let Some(mut fresh) = built else {
            return SnapshotOutcome::NotLoaded;
        };

        if let Some(current) = &self.aggregate {
            fresh.timeline = merge_timeline(&current.timeline, fresh.timeline);
        }
        debug!(thread = fresh.thread_id.0, events = fresh.timeline.len(), "Applied snapshot");
        self.aggregate = Some(fresh);
        SnapshotOutcome::Updated
    }

    /// Append an optimistic text message. Rejected while the thread is
    /// closed or not yet loaded; the returned id identifies the pending
    /// event until a server echo supersedes it.
    pub fn append_local_text(&mut self, body: impl Into<String>) -> Result<EventId> {
        let kind = EventKind::Text { body: body.into() };
        self.append_local(kind)
    }

    /// Append an optimistic file message after an upload was accepted.
    pub fn append_local_file(
        &mut self,
        file_name: impl Into<String>,
        file_url: impl Into<String>,
        file_kind: FileKind,
        caption: Option<String>,
    ) -> Result<EventId> {
        let kind = EventKind::File {
            file_name: file_name.into(),
            file_url: file_url.into(),
            file_kind,
            caption,
        };
        self.append_local(kind)
    }

    fn append_local(&mut self, kind: EventKind) -> Result<EventId> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;
        if !aggregate.composer_open() {
            return Err(ClientError::ThreadClosed);
        }

        let id = EventId::Local(Uuid::new_v4());
        aggregate.timeline.push(TimelineEvent {
            id,
            request_id: aggregate.display_id.clone(),
            sender: UserRef::Current,
            timestamp: Utc::now(),
            seen: false,
            kind,
        });
        sort_events(&mut aggregate.timeline);
        Ok(id)
    }

    /// Apply an acknowledged approval decision: the prompt disappears and
    /// both status fields move, without waiting for the next poll.
    pub fn apply_approval(&mut self, decision: ApprovalDecision) -> Result<()> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;

        let (approval, status) = match decision {
            ApprovalDecision::Approved => (ApprovalStatus::Approved, RequestStatus::Approved),
            ApprovalDecision::Rejected => (ApprovalStatus::Rejected, RequestStatus::Rejected),
        };
        aggregate.approval_status = approval;
        aggregate.status = status;
        aggregate.approved_by = Some(UserRef::Current);
        aggregate.approval_at = Some(Utc::now());
        aggregate
            .timeline
            .retain(|e| !matches!(e.id, EventId::ApprovalPrompt(_)));
        Ok(())
    }

    /// Apply a progress record echoed by the backend. Replaces any existing
    /// record with the same id, so retries are harmless.
    pub fn apply_progress(&mut self, update: ProgressUpdate) -> Result<()> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;

        aggregate.progress_updates.retain(|p| p.id != update.id);
        aggregate.progress_updates.push(update.clone());
        aggregate
            .timeline
            .retain(|e| e.id != EventId::Progress(update.id));
        let event = progress_event(update, &aggregate.display_id);
        aggregate.timeline.push(event);
        sort_events(&mut aggregate.timeline);
        Ok(())
    }

    /// Apply a newly created gate pass. Rejected while another pass still
    /// has its vehicle out.
    pub fn apply_gate_pass(&mut self, pass: GatePass) -> Result<()> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;
        if aggregate.active_gate_pass().is_some() {
            return Err(ClientError::PassStillOut);
        }

        let events = gate_pass_events(&pass, &aggregate.display_id);
        aggregate.gate_passes.push(pass);
        aggregate.timeline.extend(events);
        sort_events(&mut aggregate.timeline);
        Ok(())
    }

    /// Apply the updated pass record after the vehicle was marked back in.
    /// The pass's events are regenerated so the return card appears and
    /// nothing duplicates on the next poll.
    pub fn apply_vehicle_in(&mut self, pass: GatePass) -> Result<()> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;

        let pass_id = pass.id;
        aggregate.gate_passes.retain(|p| p.id != pass_id);
        aggregate.gate_passes.push(pass.clone());
        aggregate.timeline.retain(|e| {
            !matches!(
                e.id,
                EventId::PassCreated(id) | EventId::PassExited(id) | EventId::PassReturned(id)
                    if id == pass_id
            )
        });
        let events = gate_pass_events(&pass, &aggregate.display_id);
        aggregate.timeline.extend(events);
        sort_events(&mut aggregate.timeline);
        Ok(())
    }

    /// Mark the request's work finished; closes the composer immediately.
    pub fn apply_completed(&mut self) -> Result<()> {
        let aggregate = self.aggregate.as_mut().ok_or(ClientError::NotLoaded)?;
        aggregate.status = RequestStatus::WorkCompleted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use glathread_shared::types::{PassMode, Role};
    use glathread_view::ApproverPolicy;
    use serde_json::json;

    fn session() -> ThreadSession {
        let builder =
            ThreadViewModelBuilder::new("http://127.0.0.1:8000", ApproverPolicy::default());
        ThreadSession::new(builder)
    }

    fn snapshot(status: &str, approval: &str) -> Value {
        json!({
            "success": true,
            "thread": {
                "id": 7,
                "thread_number": 7,
                "title": "Team Outing Transport",
                "description": "Pickup at 9am",
                "status": status,
                "approval_status": approval,
                "created_by": 2,
                "created_by_name": "Phoenix Baker",
                "created_at": "2024-07-14T12:30:00Z",
                "updated_at": "2024-07-22T12:30:00Z",
                "messages": [],
                "progress_updates": [],
                "gate_passes": []
            }
        })
    }

    fn ts(s: &str) -> DateTime<chrono::Utc> {
        glathread_shared::snapshot::parse_timestamp(s).unwrap()
    }

    fn pass(id: i64, out: Option<&str>, inn: Option<&str>) -> GatePass {
        GatePass {
            id,
            issued_to: UserRef::Backend(9),
            issued_to_name: "Ken T.".into(),
            vehicle_number: "MH14-CD5678".into(),
            purpose: "Material dispatch".into(),
            valid_from: ts("2024-07-28T08:00:00Z"),
            valid_to: ts("2024-07-28T20:00:00Z"),
            status: "approved".into(),
            pass_mode: PassMode::Out,
            out_time: out.map(ts),
            in_time: inn.map(ts),
            created_at: ts("2024-07-28T08:00:00Z"),
        }
    }

    #[test]
    fn test_identical_snapshot_short_circuits() {
        let mut session = session();
        let snap = snapshot("working", "approved");
        assert_eq!(session.apply_snapshot(&snap), SnapshotOutcome::Updated);
        assert_eq!(session.apply_snapshot(&snap), SnapshotOutcome::Unchanged);
    }

    #[test]
    fn test_empty_snapshot_is_not_loaded() {
        let mut session = session();
        assert_eq!(
            session.apply_snapshot(&json!({ "success": false })),
            SnapshotOutcome::NotLoaded
        );
        assert!(session.aggregate().is_none());
    }

    #[test]
    fn test_stale_empty_snapshot_keeps_aggregate() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));
        assert_eq!(
            session.apply_snapshot(&json!({ "success": false })),
            SnapshotOutcome::NotLoaded
        );
        assert!(session.aggregate().is_some());
    }

    #[test]
    fn test_viewer_change_forces_rebuild_on_next_snapshot() {
        let mut session = session();
        let snap = snapshot("pending", "pending");
        session.apply_snapshot(&snap);

        // No viewer yet, so no prompt was synthesized.
        assert!(!session
            .aggregate()
            .unwrap()
            .timeline
            .iter()
            .any(|e| matches!(e.id, EventId::ApprovalPrompt(_))));

        session.set_viewer(4, "Drew Cano", Role::Hod);
        assert_eq!(session.apply_snapshot(&snap), SnapshotOutcome::Updated);
        assert!(session
            .aggregate()
            .unwrap()
            .timeline
            .iter()
            .any(|e| matches!(e.id, EventId::ApprovalPrompt(_))));
    }

    #[test]
    fn test_optimistic_text_survives_rebuild() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));

        let id = session.append_local_text("on my way").unwrap();
        assert!(matches!(id, EventId::Local(_)));

        // A changed snapshot forces a full rebuild and merge.
        let mut snap = snapshot("working", "approved");
        snap["thread"]["updated_at"] = json!("2024-07-23T09:00:00Z");
        assert_eq!(session.apply_snapshot(&snap), SnapshotOutcome::Updated);

        let aggregate = session.aggregate().unwrap();
        assert!(aggregate.timeline.iter().any(|e| e.id == id));
    }

    #[test]
    fn test_closed_thread_rejects_messages() {
        let mut session = session();
        session.apply_snapshot(&snapshot("work_completed", "approved"));
        assert!(matches!(
            session.append_local_text("hello"),
            Err(ClientError::ThreadClosed)
        ));
    }

    #[test]
    fn test_append_before_load_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.append_local_text("hello"),
            Err(ClientError::NotLoaded)
        ));
    }

    #[test]
    fn test_approval_removes_prompt_and_moves_status() {
        let mut session = session();
        session.set_viewer(4, "Drew Cano", Role::Hod);
        session.apply_snapshot(&snapshot("pending", "pending"));

        let prompt_shown = session
            .aggregate()
            .unwrap()
            .timeline
            .iter()
            .any(|e| matches!(e.id, EventId::ApprovalPrompt(_)));
        assert!(prompt_shown);

        session.apply_approval(ApprovalDecision::Approved).unwrap();
        let aggregate = session.aggregate().unwrap();
        assert_eq!(aggregate.approval_status, ApprovalStatus::Approved);
        assert_eq!(aggregate.status, RequestStatus::Approved);
        assert!(!aggregate
            .timeline
            .iter()
            .any(|e| matches!(e.id, EventId::ApprovalPrompt(_))));
    }

    #[test]
    fn test_progress_application_is_idempotent() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));

        let update = ProgressUpdate {
            id: 12,
            kind: glathread_shared::types::ProgressKind::Initial,
            expected_end_date: ts("2024-08-02T00:00:00Z"),
            delay_reason: None,
            updated_by_name: "Phoenix Baker".into(),
            created_at: ts("2024-07-22T13:00:00Z"),
        };
        session.apply_progress(update.clone()).unwrap();
        session.apply_progress(update).unwrap();

        let aggregate = session.aggregate().unwrap();
        assert_eq!(aggregate.progress_updates.len(), 1);
        assert_eq!(
            aggregate
                .timeline
                .iter()
                .filter(|e| e.id == EventId::Progress(12))
                .count(),
            1
        );
    }

    #[test]
    fn test_second_pass_rejected_while_vehicle_out() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));

        session
            .apply_gate_pass(pass(1, Some("2024-07-28T09:00:00Z"), None))
            .unwrap();
        assert!(matches!(
            session.apply_gate_pass(pass(2, None, None)),
            Err(ClientError::PassStillOut)
        ));
    }

    #[test]
    fn test_vehicle_in_clears_active_pointer() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));

        session
            .apply_gate_pass(pass(5, Some("2024-07-28T09:00:00Z"), None))
            .unwrap();
        assert!(session.aggregate().unwrap().active_gate_pass().is_some());

        session
            .apply_vehicle_in(pass(5, Some("2024-07-28T09:00:00Z"), Some("2024-07-28T17:00:00Z")))
            .unwrap();

        let aggregate = session.aggregate().unwrap();
        assert!(aggregate.active_gate_pass().is_none());
        assert_eq!(
            aggregate
                .timeline
                .iter()
                .filter(|e| e.id == EventId::PassReturned(5))
                .count(),
            1
        );
        assert_eq!(
            aggregate
                .timeline
                .iter()
                .filter(|e| e.id == EventId::PassCreated(5))
                .count(),
            1
        );
    }

    #[test]
    fn test_completed_closes_composer() {
        let mut session = session();
        session.apply_snapshot(&snapshot("working", "approved"));
        session.apply_completed().unwrap();

        let aggregate = session.aggregate().unwrap();
        assert_eq!(aggregate.status, RequestStatus::WorkCompleted);
        assert!(!aggregate.composer_open());
    }
}
