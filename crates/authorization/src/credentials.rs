use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AuthorizationError;

/// Account credentials for the ingestion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token_id: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_token_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_token_id: access_token_id.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Fails if either half is blank.
    pub fn validate(&self) -> Result<(), AuthorizationError> {
        if self.access_token_id.trim().is_empty() {
            return Err(AuthorizationError::InvalidCredentials(
                "access token id is empty".into(),
            ));
        }
        if self.secret_key.trim().is_empty() {
            return Err(AuthorizationError::InvalidCredentials(
                "secret key is empty".into(),
            ));
        }
        Ok(())
    }

    /// `Authorization` header value for HTTP basic auth.
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.access_token_id, self.secret_key);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token_id", &self.access_token_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
