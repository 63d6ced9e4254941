//! Timeline ordering and merge rules.
//!
//! Synthesized events are regenerated in full on every snapshot ingestion,
//! then reconciled against the existing local timeline: merge happens by
//! event id, never by index, so re-applying the same snapshot is a no-op
//! and locally-appended optimistic events survive until the server confirms
//! them.

use std::collections::HashSet;

use chrono::Duration;

use crate::model::{EventId, EventKind, GatePass, ProgressUpdate, TimelineEvent};
use glathread_shared::types::UserRef;

/// How close a server message must land to an optimistic local one (same
/// sender, same body) to be treated as its confirmation.
const SUPERSEDE_WINDOW_SECS: i64 = 120;

/// Stable ascending sort by timestamp; ties keep source order.
pub fn sort_events(events: &mut [TimelineEvent]) {
    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// Merge a freshly rebuilt timeline into the locally held one.
///
/// Rebuilt events are authoritative. Local chat messages whose id is
/// absent from the rebuilt set are retained (optimistic sends the server
/// has not echoed yet) unless a rebuilt event supersedes them by the
/// content+timestamp heuristic. Synthesized events are regenerated whole
/// on every rebuild and never retained from the local side: an approval
/// prompt that the rebuild no longer emits (someone else decided) must
/// disappear. No id is ever duplicated.
pub fn merge_timeline(local: &[TimelineEvent], mut rebuilt: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    let rebuilt_ids: HashSet<EventId> = rebuilt.iter().map(|e| e.id).collect();

    for event in local {
        if event.is_synthetic() && !matches!(event.id, EventId::Local(_)) {
            continue;
        }
        if rebuilt_ids.contains(&event.id) {
            continue;
        }
        if is_superseded(event, &rebuilt) {
            continue;
        }
        rebuilt.push(event.clone());
    }

    sort_events(&mut rebuilt);
    rebuilt
}

/// Heuristic reconciliation of optimistic ids against server ids: a
/// server-confirmed message with the same sender and body, landing within
/// the supersede window, replaces the local copy. Only locally-minted
/// events are ever superseded this way.
fn is_superseded(local: &TimelineEvent, rebuilt: &[TimelineEvent]) -> bool {
    if !matches!(local.id, EventId::Local(_)) {
        return false;
    }
    let window = Duration::seconds(SUPERSEDE_WINDOW_SECS);

    rebuilt.iter().any(|server| {
        if !matches!(server.id, EventId::Message(_)) || server.sender != local.sender {
            return false;
        }
        let close_enough = (server.timestamp - local.timestamp).abs() <= window;
        match (&local.kind, &server.kind) {
            (EventKind::Text { body: a }, EventKind::Text { body: b }) => close_enough && a == b,
            (EventKind::File { file_name: a, .. }, EventKind::File { file_name: b, .. }) => {
                close_enough && a == b
            }
            _ => false,
        }
    })
}

/// Synthesize the timeline events for one progress record.
pub fn progress_event(update: ProgressUpdate, request_id: &str) -> TimelineEvent {
    TimelineEvent {
        id: EventId::Progress(update.id),
        request_id: request_id.to_string(),
        sender: UserRef::System,
        timestamp: update.created_at,
        seen: true,
        kind: EventKind::Progress(update),
    }
}

/// Synthesize the timeline events for one gate pass record: creation, plus
/// an exit event once `out_time` is set, plus a return event once `in_time`
/// is set. A single pass fans out into up to three events.
pub fn gate_pass_events(pass: &GatePass, request_id: &str) -> Vec<TimelineEvent> {
    let mut events = vec![TimelineEvent {
        id: EventId::PassCreated(pass.id),
        request_id: request_id.to_string(),
        sender: UserRef::System,
        timestamp: pass.created_at,
        seen: true,
        kind: EventKind::PassCreated(pass.clone()),
    }];

    if let Some(out_time) = pass.out_time {
        events.push(TimelineEvent {
            id: EventId::PassExited(pass.id),
            request_id: request_id.to_string(),
            sender: UserRef::System,
            timestamp: out_time,
            seen: true,
            kind: EventKind::PassExited(pass.clone()),
        });
    }

    if let Some(in_time) = pass.in_time {
        events.push(TimelineEvent {
            id: EventId::PassReturned(pass.id),
            request_id: request_id.to_string(),
            sender: UserRef::System,
            timestamp: in_time,
            seen: true,
            kind: EventKind::PassReturned(pass.clone()),
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn ts(s: &str) -> DateTime<Utc> {
        glathread_shared::snapshot::parse_timestamp(s).unwrap()
    }

    fn text(id: EventId, sender: UserRef, body: &str, at: &str) -> TimelineEvent {
        TimelineEvent {
            id,
            request_id: "TR-007".into(),
            sender,
            timestamp: ts(at),
            seen: false,
            kind: EventKind::Text { body: body.into() },
        }
    }

    #[test]
    fn test_merge_never_duplicates_ids() {
        let shared = text(EventId::Message(1), UserRef::Backend(2), "hi", "2024-07-29T10:00:00Z");
        let local = vec![shared.clone()];
        let merged = merge_timeline(&local, vec![shared]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_optimistic_event_survives_merge() {
        let pending = text(
            EventId::Local(Uuid::new_v4()),
            UserRef::Current,
            "on my way",
            "2024-07-29T10:05:00Z",
        );
        let server = text(EventId::Message(1), UserRef::Backend(2), "hi", "2024-07-29T10:00:00Z");

        let merged = merge_timeline(&[pending.clone()], vec![server]);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|e| e.id == pending.id));
    }

    #[test]
    fn test_server_copy_supersedes_optimistic() {
        let pending = text(
            EventId::Local(Uuid::new_v4()),
            UserRef::Current,
            "on my way",
            "2024-07-29T10:05:00Z",
        );
        // Same sender and body, thirty seconds later under the server clock.
        let confirmed = text(
            EventId::Message(9),
            UserRef::Current,
            "on my way",
            "2024-07-29T10:05:30Z",
        );

        let merged = merge_timeline(&[pending], vec![confirmed]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, EventId::Message(9));
    }

    #[test]
    fn test_supersede_requires_window_and_body() {
        let pending = text(
            EventId::Local(Uuid::new_v4()),
            UserRef::Current,
            "on my way",
            "2024-07-29T10:00:00Z",
        );
        let far_away = text(EventId::Message(9), UserRef::Current, "on my way", "2024-07-29T11:00:00Z");
        let other_body = text(EventId::Message(10), UserRef::Current, "done", "2024-07-29T10:00:10Z");

        let merged = merge_timeline(&[pending.clone()], vec![far_away, other_body]);
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().any(|e| e.id == pending.id));
    }

    #[test]
    fn test_server_ids_are_never_superseded() {
        let local = text(EventId::Message(4), UserRef::Current, "hi", "2024-07-29T10:00:00Z");
        let confirmed = text(EventId::Message(9), UserRef::Current, "hi", "2024-07-29T10:00:05Z");
        let merged = merge_timeline(&[local.clone()], vec![confirmed]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_result_sorted_with_stable_ties() {
        let a = text(EventId::Message(1), UserRef::Backend(2), "a", "2024-07-29T10:00:00Z");
        let b = text(EventId::Message(2), UserRef::Backend(2), "b", "2024-07-29T10:00:00Z");
        let later = text(EventId::Message(3), UserRef::Backend(2), "c", "2024-07-29T11:00:00Z");

        let merged = merge_timeline(&[], vec![a.clone(), b.clone(), later.clone()]);
        assert_eq!(
            merged.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![a.id, b.id, later.id]
        );
    }

    #[test]
    fn test_stale_synthetic_events_are_dropped() {
        // The prompt was in the local timeline, but the rebuild no longer
        // emits it (the request was decided elsewhere).
        let prompt = TimelineEvent {
            id: EventId::ApprovalPrompt(7),
            request_id: "TR-007".into(),
            sender: UserRef::System,
            timestamp: ts("2024-07-29T10:00:00Z"),
            seen: false,
            kind: EventKind::ApprovalPrompt,
        };
        let message = text(EventId::Message(1), UserRef::Backend(2), "hi", "2024-07-29T09:00:00Z");

        let merged = merge_timeline(&[prompt, message.clone()], vec![message]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, EventId::Message(1));
    }

    #[test]
    fn test_gate_pass_fan_out() {
        use glathread_shared::types::PassMode;
        let mut pass = GatePass {
            id: 5,
            issued_to: UserRef::Backend(9),
            issued_to_name: "Ken T.".into(),
            vehicle_number: "MH12-PQ3456".into(),
            purpose: "Dispatch".into(),
            valid_from: ts("2024-07-28T08:00:00Z"),
            valid_to: ts("2024-07-28T20:00:00Z"),
            status: "approved".into(),
            pass_mode: PassMode::Out,
            out_time: None,
            in_time: None,
            created_at: ts("2024-07-28T08:00:00Z"),
        };
        assert_eq!(gate_pass_events(&pass, "TR-009").len(), 1);

        pass.out_time = Some(ts("2024-07-28T09:00:00Z"));
        assert_eq!(gate_pass_events(&pass, "TR-009").len(), 2);

        pass.in_time = Some(ts("2024-07-28T17:00:00Z"));
        let events = gate_pass_events(&pass, "TR-009");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].id, EventId::PassCreated(5));
        assert_eq!(events[1].id, EventId::PassExited(5));
        assert_eq!(events[2].id, EventId::PassReturned(5));
    }
}
