//! Upload authorization client.
//!
//! Exchanges account credentials and a [`MediaPolicy`] for a single-use
//! [`DestinationAddress`] that chunk transports upload to.
//!
//! [`MediaPolicy`]: chunkwise_protocol::MediaPolicy
//! [`DestinationAddress`]: chunkwise_protocol::DestinationAddress

pub mod client;
pub mod credentials;
pub mod error;

pub use client::{Authorizer, HttpAuthorizer, parse_authorization_response};
pub use credentials::Credentials;
pub use error::AuthorizationError;
