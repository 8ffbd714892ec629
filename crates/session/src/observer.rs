//! Session notifications.
//!
//! Observers are called synchronously, never while the session holds its
//! lock, and one notification at a time per session in the order the changes
//! happened. A notification may be delivered on a different thread than the
//! one that caused it when another thread is already delivering.
//! Implementations must return quickly; use [`ChannelObserver`] to move
//! expensive work elsewhere.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use chunkwise_protocol::SessionState;

use crate::error::SessionError;

/// How an upload attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    Aborted,
    Failed(SessionError),
}

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub finished_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(kind: OutcomeKind) -> Self {
        Self {
            kind,
            finished_at: Utc::now(),
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match &self.kind {
            OutcomeKind::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Receives session notifications. Every method defaults to a no-op.
pub trait SessionObserver: Send + Sync {
    fn on_state_changed(&self, _session_id: &str, _state: SessionState) {}

    /// Called for every accepted progress event; may be very frequent.
    fn on_progress(&self, _session_id: &str, _percent: f64) {}

    fn on_chunk_progress(&self, _session_id: &str, _chunk_index: u64, _total_chunks: u64) {}

    fn on_outcome(&self, _session_id: &str, _outcome: &Outcome) {}

    /// Human-readable status line changed.
    fn on_status(&self, _session_id: &str, _message: &str) {}

    fn on_connectivity_changed(&self, _session_id: &str, _online: bool) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// A session notification as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        session_id: String,
        state: SessionState,
    },
    Progress {
        session_id: String,
        percent: f64,
    },
    ChunkProgress {
        session_id: String,
        chunk_index: u64,
        total_chunks: u64,
    },
    Finished {
        session_id: String,
        outcome: Outcome,
    },
    Status {
        session_id: String,
        message: String,
    },
    Connectivity {
        session_id: String,
        online: bool,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::StateChanged { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::ChunkProgress { session_id, .. }
            | Self::Finished { session_id, .. }
            | Self::Status { session_id, .. }
            | Self::Connectivity { session_id, .. } => session_id,
        }
    }

    /// Progress and chunk counters; superseded by the next event of the
    /// same kind, so losing one under load is harmless.
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress { .. } | Self::ChunkProgress { .. })
    }
}

/// Forwards notifications into a tokio channel without blocking.
///
/// State, status, outcome and connectivity events are always delivered.
/// Progress events are bounded: once `progress_capacity` of them sit unread,
/// new ones are dropped until the receiver catches up.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
    queued_progress: Arc<AtomicUsize>,
    progress_capacity: usize,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn new(progress_capacity: usize) -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued_progress = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                queued_progress: queued_progress.clone(),
                progress_capacity: progress_capacity.max(1),
            },
            SessionEvents {
                rx,
                queued_progress,
            },
        )
    }

    fn forward(&self, event: SessionEvent) {
        let progress = event.is_progress();
        if progress {
            let queued = self.queued_progress.fetch_add(1, Ordering::AcqRel);
            if queued >= self.progress_capacity {
                self.queued_progress.fetch_sub(1, Ordering::AcqRel);
                debug!(session = event.session_id(), "receiver behind, progress event dropped");
                return;
            }
        }
        if self.tx.send(event).is_err() {
            if progress {
                self.queued_progress.fetch_sub(1, Ordering::AcqRel);
            }
            debug!("session event receiver closed");
        }
    }
}

/// Receiving end of a [`ChannelObserver`].
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    queued_progress: Arc<AtomicUsize>,
}

impl SessionEvents {
    /// Waits for the next event. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        let event = self.rx.recv().await?;
        Some(self.received(event))
    }

    pub fn try_recv(&mut self) -> Result<SessionEvent, TryRecvError> {
        let event = self.rx.try_recv()?;
        Ok(self.received(event))
    }

    fn received(&self, event: SessionEvent) -> SessionEvent {
        if event.is_progress() {
            self.queued_progress.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }
}

impl SessionObserver for ChannelObserver {
    fn on_state_changed(&self, session_id: &str, state: SessionState) {
        self.forward(SessionEvent::StateChanged {
            session_id: session_id.to_string(),
            state,
        });
    }

    fn on_progress(&self, session_id: &str, percent: f64) {
        self.forward(SessionEvent::Progress {
            session_id: session_id.to_string(),
            percent,
        });
    }

    fn on_chunk_progress(&self, session_id: &str, chunk_index: u64, total_chunks: u64) {
        self.forward(SessionEvent::ChunkProgress {
            session_id: session_id.to_string(),
            chunk_index,
            total_chunks,
        });
    }

    fn on_outcome(&self, session_id: &str, outcome: &Outcome) {
        self.forward(SessionEvent::Finished {
            session_id: session_id.to_string(),
            outcome: outcome.clone(),
        });
    }

    fn on_status(&self, session_id: &str, message: &str) {
        self.forward(SessionEvent::Status {
            session_id: session_id.to_string(),
            message: message.to_string(),
        });
    }

    fn on_connectivity_changed(&self, session_id: &str, online: bool) {
        self.forward(SessionEvent::Connectivity {
            session_id: session_id.to_string(),
            online,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::new(16);
        observer.on_state_changed("s1", SessionState::Uploading);
        observer.on_progress("s1", 12.5);
        observer.on_outcome("s1", &Outcome::new(OutcomeKind::Completed));

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::StateChanged {
                session_id: "s1".into(),
                state: SessionState::Uploading
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Progress {
                session_id: "s1".into(),
                percent: 12.5
            }
        );
        match rx.recv().await.unwrap() {
            SessionEvent::Finished { outcome, .. } => {
                assert_eq!(outcome.kind, OutcomeKind::Completed)
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn excess_progress_is_dropped_without_blocking() {
        let (observer, mut rx) = ChannelObserver::new(1);
        observer.on_progress("s1", 1.0);
        observer.on_progress("s1", 2.0);

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Progress {
                session_id: "s1".into(),
                percent: 1.0
            }
        );
        assert!(rx.try_recv().is_err());

        observer.on_progress("s1", 3.0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::Progress { percent, .. } if percent == 3.0
        ));
    }

    #[test]
    fn outcome_survives_a_flood_of_progress() {
        let (observer, mut rx) = ChannelObserver::new(4);
        for i in 0..100 {
            observer.on_progress("s1", f64::from(i));
            observer.on_chunk_progress("s1", 1, 3);
        }
        observer.on_state_changed("s1", SessionState::Completed);
        observer.on_status("s1", "Upload Completed Successfully");
        observer.on_outcome("s1", &Outcome::new(OutcomeKind::Completed));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events.iter().filter(|e| e.is_progress()).count(), 4);
        let tail: Vec<_> = events.iter().filter(|e| !e.is_progress()).collect();
        assert_eq!(tail.len(), 3);
        assert!(matches!(
            tail[0],
            SessionEvent::StateChanged { state: SessionState::Completed, .. }
        ));
        assert!(matches!(
            tail[2],
            SessionEvent::Finished { outcome, .. } if outcome.kind == OutcomeKind::Completed
        ));
    }

    #[test]
    fn closed_receiver_does_not_panic() {
        let (observer, rx) = ChannelObserver::new(1);
        drop(rx);
        observer.on_progress("s1", 1.0);
        observer.on_outcome("s1", &Outcome::new(OutcomeKind::Aborted));
    }

    #[test]
    fn outcome_error_accessor() {
        let failed = Outcome::new(OutcomeKind::Failed(SessionError::Transport("x".into())));
        assert_eq!(failed.error().map(|e| e.message()), Some("x"));
        assert!(Outcome::new(OutcomeKind::Aborted).error().is_none());
    }

    #[test]
    fn outcome_serialization() {
        let outcome = Outcome::new(OutcomeKind::Failed(SessionError::Authorization(
            "denied".into(),
        )));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"]["kind"], "failed");
        assert_eq!(json["kind"]["error"]["kind"], "authorization");
        assert!(json["finishedAt"].is_string());
    }

    #[test]
    fn null_observer_accepts_everything() {
        let observer = NullObserver;
        observer.on_state_changed("s", SessionState::Idle);
        observer.on_status("s", "hi");
    }
}
