//! TTL cache for group lookup results.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// String-keyed cache whose entries expire after a per-entry TTL.
///
/// Expired entries are evicted lazily when read; `clear_expired` sweeps
/// the rest. A TTL of zero makes an entry expire immediately.
pub struct Cache<V> {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Cache<V> {
    /// Creates an empty cache with the given default TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the live value for `key`, evicting it first if expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            if now < entry.expires_at {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Stores `value` under `key` with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key` with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry { value, expires_at: Instant::now() + ttl };
        self.lock().insert(key.into(), entry);
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!(dropped, "evicted expired cache entries");
        }
        dropped
    }

    /// Number of entries currently stored, including expired ones not yet
    /// evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
