use std::time::Duration;

/// One mebibyte. Chunk sizes entered in "MB" are interpreted as MiB.
pub const MIB: u64 = 1024 * 1024;

/// Chunk size used when the requested size is missing or out of bounds.
pub const DEFAULT_CHUNK_SIZE_MB: u64 = 5;

/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE_MB: u64 = 5;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE_MB: u64 = 500;

/// Ingestion endpoint that hands out single-use upload addresses.
pub const DEFAULT_INGESTION_ENDPOINT: &str = "https://venus-v1.fastpix.dev/on-demand/uploads/v2";

/// Timeout for the authorization request.
pub const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the reachability probe runs.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Converts a megabyte count into bytes, saturating on overflow.
pub fn megabytes_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(MIB)
}
