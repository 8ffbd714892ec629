//! Public types for the connectivity monitor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chunkwise_protocol::constants::{PROBE_INTERVAL, PROBE_TIMEOUT};

/// Callback invoked with the new online state after every transition.
///
/// Runs on the thread that reported the transition and must not block.
pub type ConnectivityCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Identifies one subscription; pass it back to
/// [`ConnectivityMonitor::unsubscribe`](crate::ConnectivityMonitor::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Configuration for the periodic reachability probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// URL that receives a `HEAD` request; any HTTP response counts as online.
    pub url: String,
    /// Delay between two probes.
    pub interval: Duration,
    /// Timeout of a single probe.
    pub timeout: Duration,
}

impl ProbeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: PROBE_INTERVAL,
            timeout: PROBE_TIMEOUT,
        }
    }
}
