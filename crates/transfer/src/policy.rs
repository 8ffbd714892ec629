use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chunkwise_protocol::constants::{
    DEFAULT_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB, MIN_CHUNK_SIZE_MB, megabytes_to_bytes,
};

/// A caller's chunk size choice, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum ChunkSizeRequest {
    /// No preference.
    #[default]
    Default,
    /// Whole megabytes (MiB).
    Megabytes(i64),
    /// Megabytes from a numeric source that may carry fractions or NaN.
    Float(f64),
    /// Raw text from an input field.
    Text(String),
    /// Exact byte count.
    Bytes(u64),
}

impl From<i64> for ChunkSizeRequest {
    fn from(mb: i64) -> Self {
        Self::Megabytes(mb)
    }
}

impl From<f64> for ChunkSizeRequest {
    fn from(mb: f64) -> Self {
        Self::Float(mb)
    }
}

impl From<&str> for ChunkSizeRequest {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Allowed chunk sizes in bytes.
///
/// Anything that is not a positive whole size inside `[min_bytes, max_bytes]`
/// resolves to `default_bytes`. Out-of-range values are replaced, not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSizePolicy {
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub default_bytes: u64,
}

impl Default for ChunkSizePolicy {
    fn default() -> Self {
        Self {
            min_bytes: megabytes_to_bytes(MIN_CHUNK_SIZE_MB),
            max_bytes: megabytes_to_bytes(MAX_CHUNK_SIZE_MB),
            default_bytes: megabytes_to_bytes(DEFAULT_CHUNK_SIZE_MB),
        }
    }
}

impl ChunkSizePolicy {
    /// Builds a policy from megabyte bounds.
    ///
    /// Inconsistent bounds (zero minimum, `min > max`, default outside the
    /// range) yield the built-in policy.
    pub fn from_megabytes(min_mb: u64, max_mb: u64, default_mb: u64) -> Self {
        let policy = Self {
            min_bytes: megabytes_to_bytes(min_mb),
            max_bytes: megabytes_to_bytes(max_mb),
            default_bytes: megabytes_to_bytes(default_mb),
        };
        if policy.is_consistent() {
            policy
        } else {
            warn!(min_mb, max_mb, default_mb, "inconsistent chunk size bounds, using built-in");
            Self::default()
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.min_bytes > 0
            && self.min_bytes <= self.max_bytes
            && (self.min_bytes..=self.max_bytes).contains(&self.default_bytes)
    }

    pub fn contains(&self, bytes: u64) -> bool {
        (self.min_bytes..=self.max_bytes).contains(&bytes)
    }

    /// Resolves any request to an effective chunk size in bytes.
    pub fn resolve(&self, request: &ChunkSizeRequest) -> u64 {
        match request {
            ChunkSizeRequest::Default => self.default_bytes,
            ChunkSizeRequest::Megabytes(mb) => self.resolve_megabytes(*mb),
            ChunkSizeRequest::Float(mb) => self.resolve_float(*mb),
            ChunkSizeRequest::Text(text) => self.resolve_input(text),
            ChunkSizeRequest::Bytes(bytes) => self.resolve_bytes(*bytes),
        }
    }

    pub fn resolve_bytes(&self, bytes: u64) -> u64 {
        if self.contains(bytes) {
            bytes
        } else {
            debug!(bytes, default = self.default_bytes, "chunk size out of range, using default");
            self.default_bytes
        }
    }

    pub fn resolve_megabytes(&self, mb: i64) -> u64 {
        match u64::try_from(mb) {
            Ok(mb) if mb > 0 => self.resolve_bytes(megabytes_to_bytes(mb)),
            _ => self.default_bytes,
        }
    }

    /// Only finite, positive, whole values are considered.
    pub fn resolve_float(&self, mb: f64) -> u64 {
        if !mb.is_finite() || mb <= 0.0 || mb.fract() != 0.0 || mb > i64::MAX as f64 {
            return self.default_bytes;
        }
        self.resolve_megabytes(mb as i64)
    }

    /// Parses free-form text; anything non-numeric resolves to the default.
    pub fn resolve_input(&self, text: &str) -> u64 {
        let text = text.trim();
        if let Ok(mb) = text.parse::<i64>() {
            return self.resolve_megabytes(mb);
        }
        match text.parse::<f64>() {
            Ok(mb) => self.resolve_float(mb),
            Err(_) => self.default_bytes,
        }
    }
}
