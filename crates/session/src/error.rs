//! Session error types.

use serde::{Deserialize, Serialize};

use chunkwise_authorization::AuthorizationError;
use chunkwise_transfer::TransportError;

/// Errors a session records and reports.
///
/// Lower-level errors are flattened to their message so the value can be
/// stored as `last_error`, cloned to observers and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("transfer failed: {0}")]
    Transport(String),
}

impl SessionError {
    /// The message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(m) | Self::Authorization(m) | Self::Transport(m) => m,
        }
    }
}

impl From<AuthorizationError> for SessionError {
    fn from(e: AuthorizationError) -> Self {
        Self::Authorization(e.to_string())
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e.to_string())
    }
}
