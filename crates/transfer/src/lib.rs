//! Chunked transfer contract, chunk size policy and chunk planning.
//!
//! The byte-level transport lives outside this workspace; this crate defines
//! the seam it plugs into ([`ChunkTransport`], [`TransferHandle`],
//! [`EventSink`]) plus the pieces every transport and session agrees on.

mod plan;
mod policy;
mod throughput;
mod transport;

pub use plan::{ChunkPlan, ChunkRange};
pub use policy::{ChunkSizePolicy, ChunkSizeRequest};
pub use throughput::ThroughputMeter;
pub use transport::{ChunkTransport, EventSink, TransferHandle, TransferRequest, TransportEvent};

/// Errors produced by chunk transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer rejected: {0}")]
    Rejected(String),
}
