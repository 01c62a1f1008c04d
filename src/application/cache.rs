//! Bounded LRU cache with optional time-to-live.
//!
//! Thread-safe wrapper around [`RecencyMap`]. Expiry is checked lazily on
//! access; there is no background sweeper.

use crate::application::lock;
use crate::application::metrics::CacheMetrics;
use crate::application::ports::Clock;
use crate::domain::recency::{Lookup, RecencyMap};
use crate::infrastructure::clock::SystemClock;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for [`LruCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Maximum number of entries (clamped to at least 1)
    pub max_size: usize,
    /// Entry lifetime in milliseconds; 0 disables expiry
    #[cfg_attr(feature = "serde", serde(default))]
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            ttl_ms: 0,
        }
    }
}

impl CacheConfig {
    /// Create a config for a cache of `max_size` entries that never expire.
    pub fn new(max_size: usize) -> Self {
        Self { max_size, ttl_ms: 0 }
    }

    /// Expire entries `ttl` after insertion.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Expire entries `ttl_ms` milliseconds after insertion.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }
}

/// Bounded cache evicting the least recently used entry.
///
/// `get` promotes an entry to most recently used; `has` does not.
///
/// # Example
/// ```
/// use flowguard::{CacheConfig, LruCache};
///
/// let cache = LruCache::new(CacheConfig::new(2));
/// cache.set("a", 1);
/// cache.set("b", 2);
/// assert_eq!(cache.get("a"), Some(1)); // "a" is now most recent
/// cache.set("c", 3);                   // evicts "b"
///
/// assert!(!cache.has("b"));
/// assert_eq!(cache.keys(), vec!["a", "c"]);
/// ```
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: Mutex<RecencyMap<K, V>>,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Clone,
{
    /// Create a cache using the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(RecencyMap::new(config.max_size, config.ttl_ms)),
            clock,
            metrics: CacheMetrics::new(),
        }
    }

    /// Look up a live value and mark it most recently used.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_millis();
        let mut entries = lock(&self.entries);
        match entries.get(key, now) {
            Lookup::Hit(value) => {
                self.metrics.record_hit();
                Some(value.clone())
            }
            Lookup::Miss => {
                self.metrics.record_miss();
                None
            }
            Lookup::Expired => {
                self.metrics.record_expiration();
                None
            }
        }
    }

    /// Insert or replace a value as the most recently used entry, evicting
    /// least recently used entries beyond the size limit.
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now_millis();
        let evicted = lock(&self.entries).insert(key, value, now);
        if !evicted.is_empty() {
            self.metrics.record_evictions(evicted.len());
            tracing::debug!(?evicted, "evicted least recently used cache entries");
        }
    }

    /// Whether a live value exists, without changing eviction order.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_millis();
        lock(&self.entries).contains(key, now)
    }

    /// Remove an entry. Returns whether one was stored under `key`.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        lock(&self.entries).remove(key)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Stored entries, including expired ones not yet touched.
    pub fn size(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        lock(&self.entries).keys()
    }

    /// Maximum number of entries.
    pub fn max_size(&self) -> usize {
        lock(&self.entries).max_size()
    }

    /// Entry lifetime in milliseconds, 0 when entries never expire.
    pub fn ttl_ms(&self) -> u64 {
        lock(&self.entries).ttl_ms()
    }

    /// Hit/miss accounting for this cache.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}
