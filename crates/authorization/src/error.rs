//! Authorization error types.

/// Why an authorization attempt produced no upload address.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authorization rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authorization was not successful")]
    Unsuccessful,

    #[error("response did not contain an upload URL")]
    MissingUrl,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl AuthorizationError {
    /// Short message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => "Authorization timed out".into(),
            Self::Http(_) => "Could not reach the upload service".into(),
            Self::Rejected { status: 401 | 403, .. } => {
                "Upload service rejected the credentials".into()
            }
            Self::Rejected { status, .. } => format!("Upload service returned HTTP {status}"),
            Self::Json(_) => "Upload service returned an unreadable response".into(),
            Self::Unsuccessful | Self::MissingUrl => "Failed to get an upload URL".into(),
            Self::InvalidCredentials(_) => "Upload credentials are not configured".into(),
        }
    }
}
