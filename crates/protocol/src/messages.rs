use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::MediaPolicy;

// ---------------------------------------------------------------------------
// Authorization request / response
// ---------------------------------------------------------------------------

/// Body of the `POST` that exchanges credentials for an upload address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub cors_origin: String,
    pub push_media_settings: MediaPolicy,
}

impl AuthorizationRequest {
    pub fn new(policy: MediaPolicy) -> Self {
        Self {
            cors_origin: "*".into(),
            push_media_settings: policy,
        }
    }
}

/// Response of the ingestion endpoint.
///
/// Every field is optional on the wire; callers decide what a usable
/// response is via [`destination`](Self::destination).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AuthorizationData>,
}

/// Nested payload of a successful authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

impl AuthorizationResponse {
    /// Returns the destination address if the response is a success and
    /// carries a non-empty URL.
    pub fn destination(&self) -> Option<DestinationAddress> {
        if !self.success {
            return None;
        }
        self.data
            .as_ref()
            .and_then(|d| d.url.as_deref())
            .and_then(DestinationAddress::new)
    }
}

/// Single-use address the transport uploads chunks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationAddress(String);

impl DestinationAddress {
    /// Wraps `url`, rejecting empty or whitespace-only values.
    pub fn new(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
