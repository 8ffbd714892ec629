//! Network reachability monitor.
//!
//! Holds a single online/offline signal shared by every upload session,
//! notifies subscribers on transitions, and can keep itself current with a
//! periodic HTTP reachability probe.

pub mod monitor;
pub mod probe;
pub mod types;

pub use monitor::ConnectivityMonitor;
pub use probe::{ProbeHandle, check_reachability, spawn_probe, spawn_probe_with};
pub use types::{ConnectivityCallback, ProbeConfig, SubscriptionId};
