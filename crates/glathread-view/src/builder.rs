//! Snapshot-to-view-model construction.
//!
//! [`ThreadViewModelBuilder::build`] turns one polled backend snapshot into
//! the user directory, the synthetic timeline and the request aggregate.
//! The build is pure and total: malformed nested data degrades to empty, a
//! missing `thread` key means "not loaded yet" and is never an error, and
//! rebuilding from the same snapshot yields the same ordered timeline.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use glathread_shared::snapshot::{parse_timestamp_or, RawMessage, RawThread, ThreadDetail};
use glathread_shared::types::{
    request_display_id, ApprovalStatus, FileKind, RequestStatus, Role, ThreadId, UserRef,
};

use crate::model::{
    Document, EventId, EventKind, GatePass, ProgressUpdate, RequestAggregate, TimelineEvent, User,
};
use crate::policy::ApproverPolicy;
use crate::timeline::{gate_pass_events, progress_event, sort_events};

/// Builds view models from raw thread snapshots.
#[derive(Debug, Clone)]
pub struct ThreadViewModelBuilder {
    base_url: String,
    policy: ApproverPolicy,
}

impl ThreadViewModelBuilder {
    /// `base_url` is the backend origin used to absolutize relative media
    /// and document paths; a trailing slash is tolerated.
    pub fn new(base_url: impl Into<String>, policy: ApproverPolicy) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, policy }
    }

    /// Rebuild the aggregate and user directory from one snapshot.
    ///
    /// Returns `(None, prior_users)` when the snapshot carries no thread
    /// (not loaded yet) or does not decode at all. `viewer_id` is the
    /// signed-in user's backend id, `None` while still unresolved.
    pub fn build(
        &self,
        snapshot: &Value,
        prior_users: &[User],
        viewer_id: Option<i64>,
    ) -> (Option<RequestAggregate>, Vec<User>) {
        let detail = match ThreadDetail::from_value(snapshot) {
            Ok(detail) => detail,
            Err(e) => {
                warn!(error = %e, "Discarding snapshot that does not decode");
                return (None, prior_users.to_vec());
            }
        };
        let Some(thread) = detail.thread else {
            return (None, prior_users.to_vec());
        };

        // Epoch fallback keeps rebuilds deterministic for malformed input.
        let created_at = parse_timestamp_or(&thread.created_at, DateTime::UNIX_EPOCH);
        let updated_at = parse_timestamp_or(&thread.updated_at, created_at);
        let display_id = request_display_id(thread.thread_number);

        // Step 1: user resolution. The viewer's role is authoritative from
        // the auth endpoint; thread data may only refresh the display name.
        let mut directory = UserDirectory::new(prior_users);
        directory.upsert(
            UserRef::from_backend(thread.created_by, viewer_id),
            &thread.created_by_name,
            Role::Supervisor,
        );
        if let Some(approver) = thread.approved_by {
            let name = thread
                .approved_by_name
                .clone()
                .unwrap_or_else(|| format!("User {approver}"));
            directory.upsert(UserRef::from_backend(approver, viewer_id), &name, Role::Cfo);
        }
        for msg in &thread.messages {
            directory.upsert(
                UserRef::from_backend(msg.sender, viewer_id),
                &msg.sender_name,
                Role::Supervisor,
            );
        }
        let viewer_role = directory.role_of(UserRef::Current);

        // Step 2: document slots, in slot order.
        let documents = self.project_documents(&thread);

        // Step 4 first in push order: the details header goes in before the
        // messages so the stable sort resolves it to position 0 whenever no
        // event predates thread creation (a domain invariant, not enforced
        // defensively here).
        let mut timeline = vec![TimelineEvent {
            id: EventId::DetailsHeader(thread.id),
            request_id: display_id.clone(),
            sender: UserRef::System,
            timestamp: created_at,
            seen: true,
            kind: EventKind::DetailsHeader,
        }];

        // Step 3: message projection.
        for msg in &thread.messages {
            timeline.push(self.project_message(msg, &display_id, viewer_id, created_at));
        }

        // Step 5: approval prompt, gated by the centralized policy.
        let approval_status = ApprovalStatus::parse(&thread.approval_status);
        if approval_status == ApprovalStatus::Pending && self.policy.is_approver(viewer_role) {
            timeline.push(TimelineEvent {
                id: EventId::ApprovalPrompt(thread.id),
                request_id: display_id.clone(),
                sender: UserRef::System,
                timestamp: updated_at,
                seen: false,
                kind: EventKind::ApprovalPrompt,
            });
        }

        // Step 6: progress and gate pass synthesis.
        let progress_updates: Vec<ProgressUpdate> = thread
            .progress_updates
            .iter()
            .map(|u| ProgressUpdate::from_raw(u, created_at))
            .collect();
        for update in &progress_updates {
            timeline.push(progress_event(update.clone(), &display_id));
        }

        let gate_passes: Vec<GatePass> = thread
            .gate_passes
            .iter()
            .map(|p| GatePass::from_raw(p, viewer_id, created_at))
            .collect();
        for pass in &gate_passes {
            timeline.extend(gate_pass_events(pass, &display_id));
        }

        // Step 7: global stable sort.
        sort_events(&mut timeline);

        // Step 8: aggregate assembly; the raw thread object is retained
        // verbatim for forward-compatible field access and cheap diffing.
        let raw = snapshot.get("thread").cloned().unwrap_or(Value::Null);
        let aggregate = RequestAggregate {
            thread_id: ThreadId(thread.id),
            display_id,
            title: thread.title.clone(),
            vehicle_type: thread.vehicle_type.clone(),
            vehicle_number: thread.vehicle_number.clone(),
            request_category: thread.request_category_name.clone(),
            status: RequestStatus::parse(&thread.status),
            approval_status,
            created_by: UserRef::from_backend(thread.created_by, viewer_id),
            created_at,
            updated_at,
            description: thread.description.clone().unwrap_or_default(),
            approved_by: thread
                .approved_by
                .map(|id| UserRef::from_backend(id, viewer_id)),
            approval_at: thread
                .approval_at
                .as_deref()
                .map(|t| parse_timestamp_or(t, updated_at)),
            documents,
            progress_updates,
            gate_passes,
            timeline,
            raw,
        };

        (Some(aggregate), directory.into_users())
    }

    fn project_documents(&self, thread: &RawThread) -> Vec<Document> {
        let mut documents = Vec::new();
        for (name, file) in thread.document_slots() {
            if let Some(path) = file.as_deref().filter(|p| !p.is_empty()) {
                documents.push(Document {
                    name: name.clone().unwrap_or_else(|| "Document".to_string()),
                    url: self.absolute_url(path),
                });
            }
        }
        documents
    }

    fn project_message(
        &self,
        msg: &RawMessage,
        request_id: &str,
        viewer_id: Option<i64>,
        fallback: DateTime<Utc>,
    ) -> TimelineEvent {
        let kind = if msg.message_type == "text" {
            EventKind::Text {
                body: msg.text_message.clone().unwrap_or_default(),
            }
        } else {
            let media = msg.media_file.as_deref().unwrap_or_default();
            EventKind::File {
                file_name: media
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .unwrap_or("attachment")
                    .to_string(),
                file_url: self.absolute_url(media),
                file_kind: FileKind::from_wire(&msg.message_type),
                caption: msg.text_message.clone().filter(|t| !t.is_empty()),
            }
        };

        TimelineEvent {
            id: EventId::Message(msg.id),
            request_id: request_id.to_string(),
            sender: UserRef::from_backend(msg.sender, viewer_id),
            timestamp: parse_timestamp_or(&msg.created_at, fallback),
            seen: true,
            kind,
        }
    }

    fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

/// Deduplicated, upsertable user directory built fresh on each sync but
/// merged over the prior one so users already known locally are preserved.
struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    fn new(prior: &[User]) -> Self {
        Self {
            users: prior.to_vec(),
        }
    }

    fn upsert(&mut self, id: UserRef, name: &str, role: Role) {
        match self.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                if !name.is_empty() {
                    user.display_name = name.to_string();
                }
                if id != UserRef::Current {
                    user.role = role;
                }
            }
            None => self.users.push(User {
                id,
                display_name: name.to_string(),
                avatar_ref: None,
                // A viewer entry materializing from thread data has no
                // trusted role until the auth endpoint supplies one.
                role: if id == UserRef::Current { Role::Unknown } else { role },
            }),
        }
    }

    fn role_of(&self, id: UserRef) -> Role {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.role)
            .unwrap_or(Role::Unknown)
    }

    fn into_users(self) -> Vec<User> {
        self.users
    }
}
