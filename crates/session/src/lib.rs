//! Resumable chunked-upload sessions.
//!
//! An [`UploadSession`] owns one file's upload lifecycle: it asks an
//! [`Authorizer`](chunkwise_authorization::Authorizer) for a destination,
//! hands the file to a [`ChunkTransport`](chunkwise_transfer::ChunkTransport),
//! turns transport events into state transitions and reports everything to a
//! [`SessionObserver`]. Control calls are gated by a shared
//! [`ConnectivityMonitor`](chunkwise_connectivity::ConnectivityMonitor).
//!
//! # States
//!
//! `Idle → AwaitingAuthorization → Uploading ⇄ Paused`, ending in
//! `Completed`, `Aborted` or `Failed`. Terminal sessions return to `Idle`
//! through [`UploadSession::retry`].

pub mod error;
pub mod observer;
pub mod session;
pub mod types;
pub mod uploader;

#[cfg(test)]
pub(crate) mod mock;

pub use error::SessionError;
pub use observer::{
    ChannelObserver, NullObserver, Outcome, OutcomeKind, SessionEvent, SessionEvents,
    SessionObserver,
};
pub use session::UploadSession;
pub use types::{Affordances, Collaborators, SessionConfig, SessionSnapshot};
pub use uploader::Uploader;
