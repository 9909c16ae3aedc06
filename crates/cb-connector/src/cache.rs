//! In-flight subscription context.
//!
//! Between "subscribe requested" and "subscribe confirmed/failed" the
//! pairing of a linked account and its pending subscription is held here,
//! keyed by correlation id. The cache is never the system of record:
//! entries that expire before a confirmation arrives are lost subscribe
//! attempts, accepted by design.

use std::time::Duration;

use cb_common::ExpiringMap;
use cb_store::{LinkedAccount, Subscription};
use tracing::debug;

use crate::error::{ConnectorError, Result};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default interval between cleanup sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Context of one in-flight subscribe attempt.
#[derive(Debug, Clone)]
pub struct SubscriptionData {
    pub linked_account: LinkedAccount,
    pub subscription: Subscription,
}

/// Correlation id to pending subscription context, with time-based expiry.
pub struct CorrelationCache {
    pending: ExpiringMap<SubscriptionData>,
}

impl CorrelationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: ExpiringMap::new(ttl),
        }
    }

    /// Register a pending subscribe attempt.
    ///
    /// A live entry under the same correlation id is a caller defect (or
    /// a replayed correlation id) and fails with
    /// [`ConnectorError::CacheCollision`].
    pub fn add(&self, correlation_id: &str, data: SubscriptionData) -> Result<()> {
        self.pending
            .insert(correlation_id, data)
            .map_err(|e| ConnectorError::CacheCollision(e.key))
    }

    /// Look at a pending entry without consuming it.
    pub fn get(&self, correlation_id: &str) -> Option<SubscriptionData> {
        self.pending.get(correlation_id)
    }

    /// Consume a pending entry on confirmation.
    pub fn take(&self, correlation_id: &str) -> Option<SubscriptionData> {
        self.pending.take(correlation_id)
    }

    /// Drop a pending entry. Absent keys are a no-op.
    pub fn remove(&self, correlation_id: &str) {
        self.pending.remove(correlation_id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Evict expired entries; each one is a lost subscribe attempt.
    pub fn sweep(&self) -> usize {
        let evicted = self.pending.sweep();
        if evicted > 0 {
            debug!(evicted = evicted, "correlation entries expired before confirmation");
        }
        evicted
    }
}

impl Default for CorrelationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_store::LinkedCloud;

    fn data() -> SubscriptionData {
        let cloud = LinkedCloud::new("partner", "https://partner.example.com");
        SubscriptionData {
            linked_account: LinkedAccount::new(cloud, "token"),
            subscription: Subscription::resource("acc-1", "dev-1", "/light/1", "secret"),
        }
    }

    #[test]
    fn add_collision_is_an_error() {
        let cache = CorrelationCache::default();
        cache.add("corr-1", data()).unwrap();
        let err = cache.add("corr-1", data()).unwrap_err();
        assert!(matches!(err, ConnectorError::CacheCollision(key) if key == "corr-1"));
    }

    #[test]
    fn remove_missing_is_a_noop() {
        let cache = CorrelationCache::default();
        cache.remove("corr-404");
    }

    #[test]
    fn take_consumes_entry_once() {
        let cache = CorrelationCache::default();
        cache.add("corr-1", data()).unwrap();
        assert!(cache.take("corr-1").is_some());
        assert!(cache.take("corr-1").is_none());
    }
}
