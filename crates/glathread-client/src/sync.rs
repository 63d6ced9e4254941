//! Background snapshot polling.
//!
//! One loop per open thread: fetch the full snapshot on a fixed interval,
//! apply it to the shared session, notify the embedder. Background fetch
//! failures are reported and swallowed; the loop keeps going until the
//! handle shuts it down. A response that arrives after shutdown was
//! requested is discarded, never applied.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::session::{SnapshotOutcome, ThreadSession};

/// Notifications emitted by the poll loop.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A snapshot was fetched and applied.
    Applied { outcome: SnapshotOutcome },
    /// A poll failed; the loop will retry on the next tick.
    Failed { error: String },
}

/// Handle to a running poll loop. Dropping it requests shutdown; `stop`
/// additionally waits for the task to wind down.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Spawn the poll loop for one thread.
///
/// `fetch` is the snapshot source, typically a captured `ApiClient` call;
/// tests substitute a fake. The first fetch happens one full interval after
/// spawn since the initial foreground load already populated the session.
pub fn spawn<F, Fut>(
    thread_id: i64,
    poll_interval: Duration,
    session: Arc<Mutex<ThreadSession>>,
    events: mpsc::Sender<SyncEvent>,
    fetch: F,
) -> SyncHandle
where
    F: Fn(i64) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value>> + Send,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The interval's first tick fires immediately; consume it so the
        // loop starts one full period after the foreground load.
        ticker.tick().await;

        debug!(thread = thread_id, interval_ms = poll_interval.as_millis() as u64, "Poll loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => {
                    debug!(thread = thread_id, "Poll loop shutting down");
                    break;
                }
            }

            let snapshot = match fetch(thread_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(thread = thread_id, error = %e, "Background poll failed");
                    let _ = events
                        .send(SyncEvent::Failed { error: e.to_string() })
                        .await;
                    continue;
                }
            };

            // The fetch may have raced a shutdown request; a late response
            // for a thread being closed must not touch the session.
            if *shutdown_rx.borrow() {
                debug!(thread = thread_id, "Discarding snapshot fetched during shutdown");
                break;
            }

            let outcome = {
                let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
                session.apply_snapshot(&snapshot)
            };
            let _ = events.send(SyncEvent::Applied { outcome }).await;
        }
    });

    SyncHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use glathread_view::{ApproverPolicy, ThreadViewModelBuilder};
    use serde_json::json;

    fn session() -> Arc<Mutex<ThreadSession>> {
        let builder =
            ThreadViewModelBuilder::new("http://127.0.0.1:8000", ApproverPolicy::default());
        Arc::new(Mutex::new(ThreadSession::new(builder)))
    }

    fn snapshot() -> Value {
        json!({
            "success": true,
            "thread": {
                "id": 7,
                "thread_number": 7,
                "title": "Team Outing Transport",
                "status": "working",
                "approval_status": "approved",
                "created_by": 2,
                "created_by_name": "Phoenix Baker",
                "created_at": "2024-07-14T12:30:00Z",
                "updated_at": "2024-07-22T12:30:00Z"
            }
        })
    }

    async fn recv(rx: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for sync event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_poll_applies_snapshot() {
        let session = session();
        let (tx, mut rx) = mpsc::channel(8);
        let snap = snapshot();

        let handle = spawn(7, Duration::from_millis(10), session.clone(), tx, move |_| {
            let snap = snap.clone();
            async move { Ok(snap) }
        });

        match recv(&mut rx).await {
            SyncEvent::Applied { outcome } => assert_eq!(outcome, SnapshotOutcome::Updated),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(session.lock().unwrap().aggregate().is_some());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_identical_polls_report_unchanged() {
        let session = session();
        session.lock().unwrap().apply_snapshot(&snapshot());
        let (tx, mut rx) = mpsc::channel(8);
        let snap = snapshot();

        let handle = spawn(7, Duration::from_millis(10), session, tx, move |_| {
            let snap = snap.clone();
            async move { Ok(snap) }
        });

        match recv(&mut rx).await {
            SyncEvent::Applied { outcome } => assert_eq!(outcome, SnapshotOutcome::Unchanged),
            other => panic!("unexpected event: {other:?}"),
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_poll_failure_is_reported_and_loop_continues() {
        let session = session();
        let (tx, mut rx) = mpsc::channel(8);

        let handle = spawn(7, Duration::from_millis(10), session, tx, move |_| async {
            Err(ClientError::Backend {
                status: 500,
                message: "boom".into(),
            })
        });

        for _ in 0..2 {
            match recv(&mut rx).await {
                SyncEvent::Failed { error } => assert!(error.contains("boom")),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_snapshot_fetched_during_shutdown_is_discarded() {
        let session = session();
        let (tx, _rx) = mpsc::channel(8);
        let gate = Arc::new(tokio::sync::Notify::new());
        let snap = snapshot();

        let fetch_gate = gate.clone();
        let handle = spawn(7, Duration::from_millis(10), session.clone(), tx, move |_| {
            let gate = fetch_gate.clone();
            let snap = snap.clone();
            async move {
                gate.notified().await;
                Ok(snap)
            }
        });

        // Let the loop tick and block inside the fetch.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Request shutdown while the fetch is in flight, then let the
        // response arrive late.
        let stopping = tokio::spawn(handle.stop());
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.notify_one();

        tokio::time::timeout(Duration::from_secs(2), stopping)
            .await
            .expect("stop did not complete")
            .expect("stop task panicked");

        assert!(session.lock().unwrap().aggregate().is_none());
    }

    #[tokio::test]
    async fn test_stop_terminates_the_loop() {
        let session = session();
        let (tx, _rx) = mpsc::channel(8);
        let snap = snapshot();

        let handle = spawn(7, Duration::from_secs(60), session, tx, move |_| {
            let snap = snap.clone();
            async move { Ok(snap) }
        });

        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("stop did not complete");
    }
}
