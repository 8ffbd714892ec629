//! Factory for sessions that share one set of collaborators.

use std::sync::Arc;

use tracing::info;

use chunkwise_authorization::{AuthorizationError, Authorizer, HttpAuthorizer};
use chunkwise_connectivity::{ConnectivityMonitor, ProbeHandle, spawn_probe};
use chunkwise_protocol::MediaPolicy;
use chunkwise_settings::UploaderSettings;
use chunkwise_transfer::{ChunkSizePolicy, ChunkSizeRequest, ChunkTransport};

use crate::observer::SessionObserver;
use crate::session::UploadSession;
use crate::types::{Collaborators, SessionConfig};

/// Builds independent [`UploadSession`]s that share a connectivity monitor,
/// an authorizer, a transport and one chunk size choice.
pub struct Uploader {
    collaborators: Collaborators,
    chunk_size_policy: ChunkSizePolicy,
    chunk_size: ChunkSizeRequest,
    media_policy: MediaPolicy,
    probe: Option<ProbeHandle>,
}

impl Uploader {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        authorizer: Arc<dyn Authorizer>,
        transport: Arc<dyn ChunkTransport>,
        chunk_size_policy: ChunkSizePolicy,
    ) -> Self {
        Self {
            collaborators: Collaborators {
                monitor,
                authorizer,
                transport,
            },
            chunk_size_policy,
            chunk_size: ChunkSizeRequest::Default,
            media_policy: MediaPolicy::default(),
            probe: None,
        }
    }

    /// Wires an uploader from settings: HTTP authorization against the
    /// configured endpoint, a connectivity monitor primed by one probe and
    /// kept current by a background probe for as long as the uploader lives.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn from_settings(
        settings: &UploaderSettings,
        transport: Arc<dyn ChunkTransport>,
    ) -> Result<Self, AuthorizationError> {
        let authorizer =
            HttpAuthorizer::new(settings.credentials())?.with_endpoint(settings.endpoint.clone());

        let probe_config = settings.probe_config();
        let monitor = Arc::new(
            ConnectivityMonitor::probe(&probe_config.url, probe_config.timeout).await,
        );
        let probe = spawn_probe(monitor.clone(), probe_config);

        info!(
            endpoint = %settings.endpoint,
            online = monitor.is_online(),
            "uploader ready"
        );

        let mut uploader = Self::new(
            monitor,
            Arc::new(authorizer),
            transport,
            settings.chunk_size_policy(),
        )
        .with_chunk_size(settings.chunk_size_request())
        .with_media_policy(settings.media_policy());
        uploader.probe = Some(probe);
        Ok(uploader)
    }

    pub fn with_chunk_size(mut self, chunk_size: impl Into<ChunkSizeRequest>) -> Self {
        self.chunk_size = chunk_size.into();
        self
    }

    pub fn with_media_policy(mut self, media_policy: MediaPolicy) -> Self {
        self.media_policy = media_policy;
        self
    }

    /// Changes the chunk size for sessions created from now on. Existing
    /// sessions keep theirs.
    pub fn set_chunk_size(&mut self, chunk_size: impl Into<ChunkSizeRequest>) {
        self.chunk_size = chunk_size.into();
    }

    /// Effective chunk size new sessions will use.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_policy.resolve(&self.chunk_size)
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.collaborators.monitor
    }

    /// Creates a session with a generated id.
    pub fn session(&self, observer: Arc<dyn SessionObserver>) -> UploadSession {
        UploadSession::new(self.config(None), self.collaborators.clone(), observer)
    }

    /// Creates a session with a caller-assigned id.
    pub fn session_with_id(
        &self,
        id: impl Into<String>,
        observer: Arc<dyn SessionObserver>,
    ) -> UploadSession {
        UploadSession::new(
            self.config(Some(id.into())),
            self.collaborators.clone(),
            observer,
        )
    }

    fn config(&self, id: Option<String>) -> SessionConfig {
        SessionConfig {
            id,
            chunk_size: self.chunk_size.clone(),
            chunk_size_policy: self.chunk_size_policy,
            media_policy: self.media_policy.clone(),
        }
    }
}
