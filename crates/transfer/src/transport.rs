use std::fmt;
use std::sync::Arc;

use chunkwise_protocol::{DestinationAddress, FileRef};

use crate::TransportError;
use crate::plan::ChunkPlan;

/// Lifecycle events a transport reports while moving chunks.
///
/// Delivered in order through an [`EventSink`]. Chunk indices are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Overall completion in percent.
    Progress { percent: f64 },
    /// A chunk is about to be sent.
    ChunkAttempt { chunk_index: u64, total_chunks: u64 },
    /// A chunk attempt failed; the transport will retry it on its own.
    ChunkFailure { chunk_index: u64, message: String },
    /// A chunk was accepted by the destination.
    ChunkSuccess { chunk_index: u64 },
    /// Every chunk has been accepted.
    Success,
    /// The transfer failed permanently.
    Error { message: String },
    /// The transport lost the network and is waiting for it to come back.
    Offline { message: String },
}

impl TransportEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::ChunkAttempt { .. } => "chunk_attempt",
            Self::ChunkFailure { .. } => "chunk_failure",
            Self::ChunkSuccess { .. } => "chunk_success",
            Self::Success => "success",
            Self::Error { .. } => "error",
            Self::Offline { .. } => "offline",
        }
    }
}

/// Everything a transport needs to start moving bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub destination: DestinationAddress,
    pub file: FileRef,
    pub chunk_size_bytes: u64,
}

impl TransferRequest {
    pub fn plan(&self) -> ChunkPlan {
        ChunkPlan::new(self.file.size_bytes, self.chunk_size_bytes)
    }
}

/// Receives transport events. Must return quickly and never block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransportEvent);
}

impl<F> EventSink for F
where
    F: Fn(TransportEvent) + Send + Sync,
{
    fn emit(&self, event: TransportEvent) {
        self(event)
    }
}

/// Control surface of one running transfer.
pub trait TransferHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    /// Stops the transfer. The transport may still deliver a few events
    /// after this returns.
    fn abort(&self);
}

impl fmt::Debug for dyn TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransferHandle")
    }
}

/// Performs the segmented byte transfer to a destination address.
///
/// `begin` must not block: implementations start their work in the
/// background and report through `sink`.
pub trait ChunkTransport: Send + Sync {
    fn begin(
        &self,
        request: TransferRequest,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn TransferHandle>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_sink_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = seen.clone();
        let sink: Arc<dyn EventSink> = Arc::new(move |event: TransportEvent| {
            seen_sink.lock().unwrap().push(event);
        });

        sink.emit(TransportEvent::Progress { percent: 10.0 });
        sink.emit(TransportEvent::Success);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], TransportEvent::Success);
    }

    #[test]
    fn event_kinds() {
        assert_eq!(TransportEvent::Success.kind(), "success");
        assert_eq!(
            TransportEvent::ChunkAttempt {
                chunk_index: 0,
                total_chunks: 1
            }
            .kind(),
            "chunk_attempt"
        );
        assert_eq!(TransportEvent::Offline { message: "x".into() }.kind(), "offline");
    }

    #[test]
    fn request_plan_uses_file_size() {
        let request = TransferRequest {
            destination: DestinationAddress::new("https://a").unwrap(),
            file: FileRef::new("clip.mp4", 12, "video/mp4"),
            chunk_size_bytes: 5,
        };
        assert_eq!(request.plan().total_chunks(), 3);
    }
}
