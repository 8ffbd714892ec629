//! Data types for upload sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chunkwise_authorization::Authorizer;
use chunkwise_connectivity::ConnectivityMonitor;
use chunkwise_protocol::{DestinationAddress, FileRef, MediaPolicy, SessionState};
use chunkwise_transfer::{ChunkSizePolicy, ChunkSizeRequest, ChunkTransport};

use crate::error::SessionError;

/// Per-session settings, fixed for the session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Caller-assigned id; a random one is generated when `None`.
    pub id: Option<String>,
    pub chunk_size: ChunkSizeRequest,
    pub chunk_size_policy: ChunkSizePolicy,
    pub media_policy: MediaPolicy,
}

impl SessionConfig {
    pub fn with_chunk_size(mut self, chunk_size: impl Into<ChunkSizeRequest>) -> Self {
        self.chunk_size = chunk_size.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// External services a session talks to. Cheap to clone and shared by
/// every session an [`Uploader`](crate::Uploader) creates.
#[derive(Clone)]
pub struct Collaborators {
    pub monitor: Arc<ConnectivityMonitor>,
    pub authorizer: Arc<dyn Authorizer>,
    pub transport: Arc<dyn ChunkTransport>,
}

/// Which control calls would currently have an effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordances {
    pub can_pause: bool,
    pub can_resume: bool,
    pub can_abort: bool,
    pub can_retry: bool,
}

impl Affordances {
    pub fn compute(state: SessionState, connectivity_blocked: bool, has_transfer: bool) -> Self {
        let controllable = !connectivity_blocked && has_transfer;
        Self {
            can_pause: controllable && state == SessionState::Uploading,
            can_resume: controllable && state == SessionState::Paused,
            can_abort: controllable && state.is_active(),
            can_retry: state.is_terminal(),
        }
    }
}

/// Consistent view of every observable session field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationAddress>,
    pub chunk_size_bytes: u64,
    pub progress_percent: f64,
    pub chunk_index: u64,
    pub total_chunks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<SessionError>,
    pub connectivity_blocked: bool,
    pub status_message: String,
    pub bytes_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
    pub affordances: Affordances,
    pub updated_at: DateTime<Utc>,
}
