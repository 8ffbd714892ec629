pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB, MIB, MIN_CHUNK_SIZE_MB};
pub use messages::{AuthorizationRequest, AuthorizationResponse, DestinationAddress};
pub use types::{AccessPolicy, FileRef, MediaPolicy, SessionState, SubtitleDirective};
