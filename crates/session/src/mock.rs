//! Test doubles shared by the session and uploader tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use chunkwise_authorization::{AuthorizationError, Authorizer};
use chunkwise_connectivity::ConnectivityMonitor;
use chunkwise_protocol::{DestinationAddress, FileRef, MediaPolicy};
use chunkwise_transfer::{
    ChunkTransport, EventSink, TransferHandle, TransferRequest, TransportError, TransportEvent,
};

use crate::observer::{ChannelObserver, NullObserver, SessionEvent, SessionEvents};
use crate::session::UploadSession;
use crate::types::{Collaborators, SessionConfig};

pub(crate) fn test_file(size_bytes: u64) -> FileRef {
    test_file_named("clip.mp4", size_bytes)
}

pub(crate) fn test_file_named(name: &str, size_bytes: u64) -> FileRef {
    FileRef::new(name, size_bytes, "video/mp4")
}

/// Collects everything currently queued on an observer channel.
pub(crate) fn drain(rx: &mut SessionEvents) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Grant {
    Address,
    Denied,
    /// Success without an upload address.
    Malformed,
}

pub(crate) struct MockAuthorizer {
    grant: Grant,
    gate: Option<Notify>,
    calls: AtomicUsize,
}

impl MockAuthorizer {
    fn new(grant: Grant, gated: bool) -> Self {
        Self {
            grant,
            gate: gated.then(Notify::new),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets a gated authorization complete.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

impl Authorizer for MockAuthorizer {
    fn authorize(
        &self,
        _policy: &MediaPolicy,
    ) -> Pin<Box<dyn Future<Output = Result<DestinationAddress, AuthorizationError>> + Send + '_>>
    {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.grant {
                Grant::Address => {
                    DestinationAddress::new(&format!("https://storage.example.com/upload/{n}"))
                        .ok_or(AuthorizationError::MissingUrl)
                }
                Grant::Denied => Err(AuthorizationError::Unsuccessful),
                Grant::Malformed => {
                    chunkwise_authorization::parse_authorization_response(br#"{"success":true}"#)
                }
            }
        })
    }
}

struct MockHandle {
    controls: Arc<Mutex<Vec<&'static str>>>,
}

impl TransferHandle for MockHandle {
    fn pause(&self) {
        self.controls.lock().unwrap().push("pause");
    }

    fn resume(&self) {
        self.controls.lock().unwrap().push("resume");
    }

    fn abort(&self) {
        self.controls.lock().unwrap().push("abort");
    }
}

/// Transport that records requests and lets tests emit events by hand.
#[derive(Default)]
pub(crate) struct MockTransport {
    requests: Mutex<Vec<TransferRequest>>,
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
    controls: Arc<Mutex<Vec<&'static str>>>,
    fail_next: AtomicBool,
}

impl MockTransport {
    pub(crate) fn begin_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> TransferRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    pub(crate) fn controls(&self) -> Vec<&'static str> {
        self.controls.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_begin(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Emits on the most recent transfer.
    pub(crate) fn emit(&self, event: TransportEvent) {
        let sink = self.sinks.lock().unwrap().last().cloned().unwrap();
        sink.emit(event);
    }

    /// Emits on the `attempt`-th transfer (zero-based).
    pub(crate) fn emit_to(&self, attempt: usize, event: TransportEvent) {
        let sink = self.sinks.lock().unwrap()[attempt].clone();
        sink.emit(event);
    }
}

impl ChunkTransport for MockTransport {
    fn begin(
        &self,
        request: TransferRequest,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn TransferHandle>, TransportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Rejected("destination refused".into()));
        }
        self.requests.lock().unwrap().push(request);
        self.sinks.lock().unwrap().push(sink);
        Ok(Box::new(MockHandle {
            controls: self.controls.clone(),
        }))
    }
}

pub(crate) struct Harness {
    pub monitor: Arc<ConnectivityMonitor>,
    pub authorizer: Arc<MockAuthorizer>,
    pub transport: Arc<MockTransport>,
}

impl Harness {
    pub(crate) fn online() -> Self {
        Self::with_monitor(true)
    }

    pub(crate) fn offline() -> Self {
        Self::with_monitor(false)
    }

    fn with_monitor(online: bool) -> Self {
        Self {
            monitor: Arc::new(ConnectivityMonitor::new(online)),
            authorizer: Arc::new(MockAuthorizer::new(Grant::Address, false)),
            transport: Arc::new(MockTransport::default()),
        }
    }

    pub(crate) fn with_denied_authorization(mut self) -> Self {
        self.authorizer = Arc::new(MockAuthorizer::new(Grant::Denied, false));
        self
    }

    pub(crate) fn with_malformed_authorization(mut self) -> Self {
        self.authorizer = Arc::new(MockAuthorizer::new(Grant::Malformed, false));
        self
    }

    pub(crate) fn with_gated_authorization(mut self) -> Self {
        self.authorizer = Arc::new(MockAuthorizer::new(Grant::Address, true));
        self
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            monitor: self.monitor.clone(),
            authorizer: self.authorizer.clone(),
            transport: self.transport.clone(),
        }
    }

    pub(crate) fn session(&self, config: SessionConfig) -> UploadSession {
        UploadSession::new(config, self.collaborators(), Arc::new(NullObserver))
    }

    pub(crate) fn observed_session(
        &self,
        config: SessionConfig,
    ) -> (UploadSession, SessionEvents) {
        let (observer, rx) = ChannelObserver::new(1024);
        (
            UploadSession::new(config, self.collaborators(), Arc::new(observer)),
            rx,
        )
    }
}
