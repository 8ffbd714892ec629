//! Shared online/offline signal with change subscriptions.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::probe::check_reachability;
use crate::types::{ConnectivityCallback, SubscriptionId};

/// Process-wide network reachability signal.
///
/// Subscribers are notified only when the value actually changes; a report
/// equal to the current state is dropped. Callbacks run outside the internal
/// lock, so a callback may subscribe or unsubscribe without deadlocking.
pub struct ConnectivityMonitor {
    online_tx: watch::Sender<bool>,
    subscribers: Mutex<Vec<(SubscriptionId, ConnectivityCallback)>>,
    next_id: AtomicU64,
}

impl ConnectivityMonitor {
    /// Creates a monitor primed with `initially_online`.
    pub fn new(initially_online: bool) -> Self {
        let (online_tx, _) = watch::channel(initially_online);
        Self {
            online_tx,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a monitor primed by a single reachability check against `url`.
    pub async fn probe(url: &str, timeout: Duration) -> Self {
        let online = check_reachability(url, timeout).await;
        debug!(url, online, "primed connectivity monitor");
        Self::new(online)
    }

    /// Current reachability.
    pub fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    /// Records a new reachability value.
    ///
    /// Returns `true` if the value changed and subscribers were notified.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.online_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return false;
        }

        info!(online, "connectivity changed");

        let callbacks: Vec<ConnectivityCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(online);
        }
        true
    }

    /// Registers a callback for reachability transitions.
    pub fn subscribe(&self, callback: ConnectivityCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        debug!(%id, "connectivity subscriber added");
        id
    }

    /// Removes a subscription. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        let removed = subs.len() != before;
        if removed {
            debug!(%id, "connectivity subscriber removed");
        }
        removed
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns a receiver that observes every change, for async consumers.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
