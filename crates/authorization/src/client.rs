//! Authorization client.
//!
//! Async HTTP client using `reqwest` with basic authentication.

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use chunkwise_protocol::constants::{AUTHORIZATION_TIMEOUT, DEFAULT_INGESTION_ENDPOINT};
use chunkwise_protocol::{AuthorizationRequest, AuthorizationResponse, DestinationAddress, MediaPolicy};

use crate::credentials::Credentials;
use crate::error::AuthorizationError;

/// Obtains a single-use upload address for a media policy.
///
/// Sessions hold this as a trait object so tests can swap in a mock.
pub trait Authorizer: Send + Sync {
    fn authorize(
        &self,
        policy: &MediaPolicy,
    ) -> Pin<Box<dyn Future<Output = Result<DestinationAddress, AuthorizationError>> + Send + '_>>;
}

/// [`Authorizer`] backed by the ingestion HTTP endpoint.
pub struct HttpAuthorizer {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl HttpAuthorizer {
    /// Creates a client for the default ingestion endpoint.
    pub fn new(credentials: Credentials) -> Result<Self, AuthorizationError> {
        let http = reqwest::Client::builder()
            .timeout(AUTHORIZATION_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: DEFAULT_INGESTION_ENDPOINT.to_string(),
            credentials,
        })
    }

    /// Points the client at a different ingestion endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_destination(
        &self,
        policy: &MediaPolicy,
    ) -> Result<DestinationAddress, AuthorizationError> {
        self.credentials.validate()?;

        let body = serde_json::to_vec(&AuthorizationRequest::new(policy.clone()))?;
        debug!(endpoint = %self.endpoint, "requesting upload address");

        let resp = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.credentials.basic_auth_header())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "authorization rejected");
            return Err(AuthorizationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let destination = parse_authorization_response(&bytes)?;
        debug!(destination = %destination, "upload address issued");
        Ok(destination)
    }
}

impl Authorizer for HttpAuthorizer {
    fn authorize(
        &self,
        policy: &MediaPolicy,
    ) -> Pin<Box<dyn Future<Output = Result<DestinationAddress, AuthorizationError>> + Send + '_>>
    {
        let policy = policy.clone();
        Box::pin(async move { self.request_destination(&policy).await })
    }
}

/// Extracts the destination address from a response body.
pub fn parse_authorization_response(body: &[u8]) -> Result<DestinationAddress, AuthorizationError> {
    let resp: AuthorizationResponse = serde_json::from_slice(body)?;
    if !resp.success {
        return Err(AuthorizationError::Unsuccessful);
    }
    resp.destination().ok_or(AuthorizationError::MissingUrl)
}
