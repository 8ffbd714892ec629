//! The upload session state machine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use chunkwise_connectivity::SubscriptionId;
use chunkwise_protocol::{DestinationAddress, FileRef, MediaPolicy, SessionState};
use chunkwise_transfer::{
    ChunkPlan, EventSink, ThroughputMeter, TransferHandle, TransferRequest, TransportEvent,
};

use crate::error::SessionError;
use crate::observer::{Outcome, OutcomeKind, SessionObserver};
use crate::types::{Affordances, Collaborators, SessionConfig, SessionSnapshot};

const STATUS_AUTHORIZING: &str = "Getting signed URL...";
const STATUS_PAUSED: &str = "Upload Paused";
const STATUS_RESUMED: &str = "Upload Resumed";
const STATUS_ABORTED: &str = "Upload Aborted";
const STATUS_CHUNK_RETRY: &str = "Chunk upload failed, retrying...";
const STATUS_COMPLETED: &str = "Upload Completed Successfully";

/// One file's upload lifecycle.
///
/// All transitions run synchronously under an internal lock. Notices are
/// queued under that lock and delivered after it is released, one at a time
/// and in queue order, so an observer never sees a change ahead of one that
/// happened before it. Dropping the session unsubscribes it from the
/// connectivity monitor and aborts any running transfer.
pub struct UploadSession {
    shared: Arc<Shared>,
    subscription: SubscriptionId,
}

struct Shared {
    id: String,
    chunk_size_bytes: u64,
    media_policy: MediaPolicy,
    collaborators: Collaborators,
    observer: Arc<dyn SessionObserver>,
    throughput: ThroughputMeter,
    inner: Mutex<Inner>,
    outbox: Mutex<Outbox>,
}

/// Notices waiting for delivery. `delivering` is set while some thread is
/// calling the observer; other threads only enqueue.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notice>,
    delivering: bool,
}

/// Clears `Outbox::delivering` when dropped, also if an observer panics.
struct Delivering<'a>(&'a Mutex<Outbox>);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delivering = false;
    }
}

struct Inner {
    state: SessionState,
    file: Option<FileRef>,
    destination: Option<DestinationAddress>,
    progress_percent: f64,
    /// 1-based position of the chunk in flight; 0 before the first attempt.
    chunk_index: u64,
    total_chunks: u64,
    last_error: Option<SessionError>,
    connectivity_blocked: bool,
    status_message: String,
    handle: Option<Arc<dyn TransferHandle>>,
    /// Bumped whenever a transfer is retired; events carry the generation
    /// they were issued for.
    generation: u64,
    updated_at: DateTime<Utc>,
}

/// Pending observer call, collected under the lock and delivered after it.
enum Notice {
    State(SessionState),
    Progress(f64),
    Chunk(u64, u64),
    Finished(Outcome),
    Status(String),
    Connectivity(bool),
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Abort,
}

impl Control {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
        }
    }
}

impl Inner {
    fn transition(&mut self, session_id: &str, to: SessionState, notices: &mut Vec<Notice>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.updated_at = Utc::now();
        info!(session = %session_id, from = %from, to = %to, "session state changed");
        notices.push(Notice::State(to));
    }

    fn set_status(&mut self, message: impl Into<String>, notices: &mut Vec<Notice>) {
        let message = message.into();
        if self.status_message != message {
            self.status_message = message.clone();
            notices.push(Notice::Status(message));
        }
    }

    fn set_progress(&mut self, percent: f64, notices: &mut Vec<Notice>) {
        if self.progress_percent != percent {
            self.progress_percent = percent;
            notices.push(Notice::Progress(percent));
        }
    }

    fn set_chunks(&mut self, chunk_index: u64, total_chunks: u64, notices: &mut Vec<Notice>) {
        if (self.chunk_index, self.total_chunks) != (chunk_index, total_chunks) {
            self.chunk_index = chunk_index;
            self.total_chunks = total_chunks;
            notices.push(Notice::Chunk(chunk_index, total_chunks));
        }
    }

    /// Retires the current transfer so its late events are dropped.
    fn retire_transfer(&mut self) -> Option<Arc<dyn TransferHandle>> {
        self.generation += 1;
        self.handle.take()
    }
}

impl UploadSession {
    /// Creates a session in `Idle`.
    pub fn new(
        config: SessionConfig,
        collaborators: Collaborators,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let id = config
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunk_size_bytes = config.chunk_size_policy.resolve(&config.chunk_size);
        let online = collaborators.monitor.is_online();

        let shared = Arc::new(Shared {
            id,
            chunk_size_bytes,
            media_policy: config.media_policy,
            collaborators,
            observer,
            throughput: ThroughputMeter::default(),
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                file: None,
                destination: None,
                progress_percent: 0.0,
                chunk_index: 0,
                total_chunks: 0,
                last_error: None,
                connectivity_blocked: !online,
                status_message: String::new(),
                handle: None,
                generation: 0,
                updated_at: Utc::now(),
            }),
            outbox: Mutex::new(Outbox::default()),
        });

        let weak = Arc::downgrade(&shared);
        let subscription = shared
            .collaborators
            .monitor
            .subscribe(Arc::new(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.sync_connectivity();
                }
            }));
        // Catch a flip that happened before the subscription existed.
        shared.sync_connectivity();

        debug!(session = %shared.id, chunk_size_bytes, "session created");
        Self {
            shared,
            subscription,
        }
    }

    /// Authorizes and begins uploading `file`.
    ///
    /// Fails with [`SessionError::InvalidArgument`] without any state change
    /// when `file` is `None`, and is a no-op once the session has left
    /// `Idle`. Authorization and transport failures move the session to
    /// `Failed` and are also returned.
    pub async fn start(&self, file: Option<FileRef>) -> Result<(), SessionError> {
        let Some(file) = file else {
            return Err(SessionError::InvalidArgument("no file selected".into()));
        };
        let shared = &self.shared;

        let mut notices = Vec::new();
        let generation = {
            let mut inner = shared.lock();
            if inner.state != SessionState::Idle {
                debug!(session = %shared.id, state = %inner.state, "start ignored");
                return Ok(());
            }
            inner.generation += 1;
            inner.destination = None;
            inner.last_error = None;
            inner.progress_percent = 0.0;
            inner.chunk_index = 0;
            inner.total_chunks = 0;
            inner.file = Some(file.clone());
            inner.transition(&shared.id, SessionState::AwaitingAuthorization, &mut notices);
            inner.set_status(STATUS_AUTHORIZING, &mut notices);
            shared.throughput.reset();
            let generation = inner.generation;
            shared.publish(inner, notices);
            generation
        };

        let authorizer = shared.collaborators.authorizer.clone();
        let authorization = authorizer.authorize(&shared.media_policy).await;

        let mut notices = Vec::new();
        let request = {
            let mut inner = shared.lock();
            if inner.generation != generation
                || inner.state != SessionState::AwaitingAuthorization
            {
                debug!(session = %shared.id, "authorization result for retired attempt dropped");
                return Ok(());
            }

            let destination = match authorization {
                Ok(destination) => destination,
                Err(e) => {
                    warn!(session = %shared.id, error = %e, "authorization failed");
                    let shown = e.user_message();
                    let err = SessionError::from(e);
                    shared.fail_with_status(&mut inner, err.clone(), &shown, &mut notices);
                    shared.publish(inner, notices);
                    return Err(err);
                }
            };

            let plan = ChunkPlan::new(file.size_bytes, shared.chunk_size_bytes);
            inner.destination = Some(destination.clone());
            inner.transition(&shared.id, SessionState::Uploading, &mut notices);
            inner.set_chunks(0, plan.total_chunks(), &mut notices);
            inner.set_status("Uploading: 0%", &mut notices);
            shared.publish(inner, notices);
            TransferRequest {
                destination,
                file,
                chunk_size_bytes: shared.chunk_size_bytes,
            }
        };

        debug!(
            session = %shared.id,
            destination = %request.destination,
            chunk_size_bytes = request.chunk_size_bytes,
            "beginning transfer"
        );
        let sink: Arc<dyn EventSink> = Arc::new(SessionSink {
            shared: Arc::downgrade(shared),
            generation,
        });
        let begun = shared.collaborators.transport.begin(request, sink);

        let mut notices = Vec::new();
        let mut inner = shared.lock();
        let current = inner.generation == generation && inner.state.is_active();
        let result = match begun {
            Ok(handle) if current => {
                inner.handle = Some(Arc::from(handle));
                Ok(())
            }
            Ok(_) => {
                debug!(session = %shared.id, state = %inner.state, "transfer finished before handle was stored");
                Ok(())
            }
            Err(e) if current => {
                warn!(session = %shared.id, error = %e, "transport refused to begin");
                let err = SessionError::from(e);
                shared.fail(&mut inner, err.clone(), &mut notices);
                Err(err)
            }
            Err(e) => {
                debug!(session = %shared.id, error = %e, "begin failed for retired attempt");
                Ok(())
            }
        };
        shared.publish(inner, notices);
        result
    }

    /// Pauses an active transfer. Returns `false` when nothing happened.
    pub fn pause(&self) -> bool {
        self.shared.control(Control::Pause)
    }

    /// Resumes a paused transfer. Returns `false` when nothing happened.
    pub fn resume(&self) -> bool {
        self.shared.control(Control::Resume)
    }

    /// Aborts an active or paused transfer. Returns `false` when nothing
    /// happened.
    pub fn abort(&self) -> bool {
        self.shared.control(Control::Abort)
    }

    /// Returns a terminal session to `Idle`, clearing the file, destination,
    /// progress, chunk counters and error.
    pub fn retry(&self) -> bool {
        let shared = &self.shared;
        let mut notices = Vec::new();
        {
            let mut inner = shared.lock();
            if !inner.state.is_terminal() {
                debug!(session = %shared.id, state = %inner.state, "retry ignored");
                return false;
            }
            inner.retire_transfer();
            inner.file = None;
            inner.destination = None;
            inner.last_error = None;
            inner.set_progress(0.0, &mut notices);
            inner.set_chunks(0, 0, &mut notices);
            inner.set_status("", &mut notices);
            inner.transition(&shared.id, SessionState::Idle, &mut notices);
            shared.throughput.reset();
            shared.publish(inner, notices);
        }
        true
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Effective chunk size after applying the chunk size policy.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.shared.chunk_size_bytes
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn progress_percent(&self) -> f64 {
        self.shared.lock().progress_percent
    }

    pub fn chunk_index(&self) -> u64 {
        self.shared.lock().chunk_index
    }

    pub fn total_chunks(&self) -> u64 {
        self.shared.lock().total_chunks
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.shared.lock().last_error.clone()
    }

    pub fn destination(&self) -> Option<DestinationAddress> {
        self.shared.lock().destination.clone()
    }

    pub fn file(&self) -> Option<FileRef> {
        self.shared.lock().file.clone()
    }

    pub fn connectivity_blocked(&self) -> bool {
        self.shared.lock().connectivity_blocked
    }

    pub fn status_message(&self) -> String {
        self.shared.lock().status_message.clone()
    }

    /// Whether a transport handle is currently held.
    pub fn has_transfer(&self) -> bool {
        self.shared.lock().handle.is_some()
    }

    pub fn affordances(&self) -> Affordances {
        let inner = self.shared.lock();
        Affordances::compute(inner.state, inner.connectivity_blocked, inner.handle.is_some())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let bytes_per_second = self.shared.throughput.bytes_per_second();
        let inner = self.shared.lock();

        let eta_secs = inner.file.as_ref().and_then(|file| {
            let plan = ChunkPlan::new(file.size_bytes, self.shared.chunk_size_bytes);
            let remaining = file
                .size_bytes
                .saturating_sub(plan.bytes_at_percent(inner.progress_percent));
            self.shared.throughput.eta(remaining).map(|d| d.as_secs())
        });

        SessionSnapshot {
            id: self.shared.id.clone(),
            state: inner.state,
            file: inner.file.clone(),
            destination: inner.destination.clone(),
            chunk_size_bytes: self.shared.chunk_size_bytes,
            progress_percent: inner.progress_percent,
            chunk_index: inner.chunk_index,
            total_chunks: inner.total_chunks,
            last_error: inner.last_error.clone(),
            connectivity_blocked: inner.connectivity_blocked,
            status_message: inner.status_message.clone(),
            bytes_per_second,
            eta_secs,
            affordances: Affordances::compute(
                inner.state,
                inner.connectivity_blocked,
                inner.handle.is_some(),
            ),
            updated_at: inner.updated_at,
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.shared
            .collaborators
            .monitor
            .unsubscribe(self.subscription);
        let handle = self.shared.lock().retire_transfer();
        if let Some(handle) = handle {
            debug!(session = %self.shared.id, "aborting transfer of dropped session");
            handle.abort();
        }
    }
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("UploadSession")
            .field("id", &self.shared.id)
            .field("state", &inner.state)
            .field("progress_percent", &inner.progress_percent)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `notices`. Callers hold the `inner` lock (witnessed by `_held`),
    /// which makes queue order the order the changes were made in.
    fn enqueue(&self, _held: &Inner, notices: Vec<Notice>) {
        if !notices.is_empty() {
            self.outbox().queue.extend(notices);
        }
    }

    /// Queues `notices`, releases `inner` and delivers.
    fn publish(&self, inner: MutexGuard<'_, Inner>, notices: Vec<Notice>) {
        self.enqueue(&inner, notices);
        drop(inner);
        self.flush();
    }

    /// Delivers queued notices unless another thread already is; that thread
    /// picks up whatever is queued before it stops.
    fn flush(&self) {
        loop {
            let batch: Vec<Notice> = {
                let mut outbox = self.outbox();
                if outbox.delivering || outbox.queue.is_empty() {
                    return;
                }
                outbox.delivering = true;
                outbox.queue.drain(..).collect()
            };
            let _delivering = Delivering(&self.outbox);
            self.deliver(batch);
        }
    }

    fn deliver(&self, notices: Vec<Notice>) {
        let id = self.id.as_str();
        for notice in notices {
            match notice {
                Notice::State(state) => self.observer.on_state_changed(id, state),
                Notice::Progress(percent) => self.observer.on_progress(id, percent),
                Notice::Chunk(index, total) => self.observer.on_chunk_progress(id, index, total),
                Notice::Finished(outcome) => self.observer.on_outcome(id, &outcome),
                Notice::Status(message) => self.observer.on_status(id, &message),
                Notice::Connectivity(online) => self.observer.on_connectivity_changed(id, online),
            }
        }
    }

    fn fail(&self, inner: &mut Inner, err: SessionError, notices: &mut Vec<Notice>) {
        let shown = err.message().to_string();
        self.fail_with_status(inner, err, &shown, notices);
    }

    /// Like [`fail`](Self::fail), with `shown` as the status line detail.
    fn fail_with_status(
        &self,
        inner: &mut Inner,
        err: SessionError,
        shown: &str,
        notices: &mut Vec<Notice>,
    ) {
        inner.retire_transfer();
        inner.last_error = Some(err.clone());
        inner.set_status(format!("Error: {shown}"), notices);
        inner.transition(&self.id, SessionState::Failed, notices);
        notices.push(Notice::Finished(Outcome::new(OutcomeKind::Failed(err))));
    }

    fn control(&self, op: Control) -> bool {
        let mut notices = Vec::new();
        let handle = {
            let mut inner = self.lock();
            if inner.connectivity_blocked {
                debug!(session = %self.id, op = op.as_str(), "control ignored while offline");
                return false;
            }
            let Some(handle) = inner.handle.clone() else {
                debug!(session = %self.id, op = op.as_str(), "control ignored without transfer");
                return false;
            };
            let allowed = match op {
                Control::Pause => inner.state == SessionState::Uploading,
                Control::Resume => inner.state == SessionState::Paused,
                Control::Abort => inner.state.is_active(),
            };
            if !allowed {
                debug!(session = %self.id, op = op.as_str(), state = %inner.state, "control not applicable");
                return false;
            }

            match op {
                Control::Pause => {
                    inner.transition(&self.id, SessionState::Paused, &mut notices);
                    inner.set_status(STATUS_PAUSED, &mut notices);
                }
                Control::Resume => {
                    inner.transition(&self.id, SessionState::Uploading, &mut notices);
                    inner.set_status(STATUS_RESUMED, &mut notices);
                }
                Control::Abort => {
                    inner.retire_transfer();
                    inner.transition(&self.id, SessionState::Aborted, &mut notices);
                    inner.set_status(STATUS_ABORTED, &mut notices);
                    notices.push(Notice::Finished(Outcome::new(OutcomeKind::Aborted)));
                }
            }
            self.enqueue(&inner, notices);
            handle
        };

        match op {
            Control::Pause => handle.pause(),
            Control::Resume => handle.resume(),
            Control::Abort => handle.abort(),
        }
        self.flush();
        true
    }

    /// Re-reads the monitor under the session lock. The callback argument is
    /// ignored: overlapping flips may deliver values out of order, but the
    /// last sync to take the lock always sees the latest value.
    fn sync_connectivity(&self) {
        let mut inner = self.lock();
        let online = self.collaborators.monitor.is_online();
        let blocked = !online;
        if inner.connectivity_blocked == blocked {
            return;
        }
        inner.connectivity_blocked = blocked;
        inner.updated_at = Utc::now();
        debug!(session = %self.id, online, "session connectivity changed");
        self.publish(inner, vec![Notice::Connectivity(online)]);
    }

    fn handle_event(&self, generation: u64, event: TransportEvent) {
        let mut notices = Vec::new();
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(session = %self.id, event = event.kind(), "event from retired transfer ignored");
            return;
        }
        if !inner.state.is_active() {
            debug!(session = %self.id, event = event.kind(), state = %inner.state, "event ignored in state");
            return;
        }

        match event {
            TransportEvent::Progress { percent } => {
                if !percent.is_finite() {
                    debug!(session = %self.id, "non-finite progress ignored");
                    return;
                }
                let percent = percent.clamp(0.0, 100.0);
                trace!(session = %self.id, percent, "progress");
                inner.set_progress(percent, &mut notices);
                if let Some(file) = &inner.file {
                    let plan = ChunkPlan::new(file.size_bytes, self.chunk_size_bytes);
                    self.throughput.record(plan.bytes_at_percent(percent));
                }
                if inner.state == SessionState::Uploading {
                    inner.set_status(format!("Uploading: {}%", percent.round()), &mut notices);
                }
            }
            TransportEvent::ChunkAttempt {
                chunk_index,
                total_chunks,
            } => {
                let total = if total_chunks > 0 {
                    total_chunks
                } else {
                    inner.total_chunks
                };
                let position = chunk_index.saturating_add(1);
                let position = if total > 0 { position.min(total) } else { position };
                trace!(session = %self.id, chunk = position, total, "chunk attempt");
                inner.set_chunks(position, total.max(position), &mut notices);
            }
            TransportEvent::ChunkFailure {
                chunk_index,
                message,
            } => {
                warn!(session = %self.id, chunk_index, error = %message, "chunk attempt failed");
                inner.set_status(STATUS_CHUNK_RETRY, &mut notices);
            }
            TransportEvent::ChunkSuccess { chunk_index } => {
                debug!(session = %self.id, chunk_index, "chunk uploaded");
            }
            TransportEvent::Offline { message } => {
                info!(session = %self.id, message = %message, "transport offline");
                inner.set_status(message, &mut notices);
            }
            TransportEvent::Success => {
                inner.retire_transfer();
                inner.set_progress(100.0, &mut notices);
                let total = inner.total_chunks;
                inner.set_chunks(total, total, &mut notices);
                inner.transition(&self.id, SessionState::Completed, &mut notices);
                inner.set_status(STATUS_COMPLETED, &mut notices);
                notices.push(Notice::Finished(Outcome::new(OutcomeKind::Completed)));
            }
            TransportEvent::Error { message } => {
                warn!(session = %self.id, error = %message, "transfer failed");
                self.fail(&mut inner, SessionError::Transport(message), &mut notices);
            }
        }
        self.publish(inner, notices);
    }
}

/// Sink handed to the transport for one attempt.
struct SessionSink {
    shared: Weak<Shared>,
    generation: u64,
}

impl EventSink for SessionSink {
    fn emit(&self, event: TransportEvent) {
        match self.shared.upgrade() {
            Some(shared) => shared.handle_event(self.generation, event),
            None => trace!(event = event.kind(), "event for dropped session ignored"),
        }
    }
}
