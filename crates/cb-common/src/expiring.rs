//! Expiring key-value map.
//!
//! Backs the correlation cache: entries live for a fixed TTL from
//! insertion, expiry is lazy on access, and a periodic [`ExpiringMap::sweep`]
//! reclaims entries nothing ever looked up again. `insert` refuses to
//! overwrite a live entry; concurrent inserters of the same key are
//! serialized on the shard entry lock.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Returned by [`ExpiringMap::insert`] when a live entry already holds the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExists {
    pub key: String,
}

impl std::fmt::Display for KeyExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key already present: {}", self.key)
    }
}

impl std::error::Error for KeyExists {}

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent string-keyed map with per-entry time-to-live.
pub struct ExpiringMap<V> {
    entries: DashMap<String, Slot<V>>,
    ttl: Duration,
}

impl<V> ExpiringMap<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert a value under `key` with the default TTL.
    ///
    /// Fails if a non-expired entry already exists; an expired entry is
    /// replaced. Atomic with respect to concurrent callers on the same key.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Result<(), KeyExists> {
        let key = key.into();
        let expires_at = Instant::now() + self.ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > Instant::now() {
                    return Err(KeyExists {
                        key: occupied.key().clone(),
                    });
                }
                occupied.insert(Slot { value, expires_at });
                Ok(())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { value, expires_at });
                Ok(())
            }
        }
    }

    /// Remove an entry. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries
            .remove(key)
            .filter(|(_, slot)| slot.expires_at > Instant::now())
            .map(|(_, slot)| slot.value)
    }

    /// Remove and return the live entry for `key`, if any.
    pub fn take(&self, key: &str) -> Option<V> {
        self.remove(key)
    }

    /// Clone out the live entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let entry = self.entries.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Number of entries currently held, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted = evicted, "expired entries evicted from map");
        }
        evicted
    }
}
