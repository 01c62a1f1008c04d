//! Observability metrics for the LRU cache.
//!
//! Provides hit/miss accounting for monitoring and tuning cache sizes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking cache effectiveness.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Cloning yields another handle to the same counters.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    inner: Arc<CacheMetricsInner>,
}

#[derive(Debug, Default)]
struct CacheMetricsInner {
    /// Lookups that returned a live value
    hits: AtomicU64,
    /// Lookups for keys that were never stored or already removed
    misses: AtomicU64,
    /// Lookups that found an expired entry (and removed it)
    expirations: AtomicU64,
    /// Entries pushed out by capacity pressure
    evictions: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheMetricsInner::default()),
        }
    }

    pub(crate) fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.inner.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner
            .evictions
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Lookups that returned a live value.
    pub fn hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    /// Lookups for absent keys.
    pub fn misses(&self) -> u64 {
        self.inner.misses.load(Ordering::Relaxed)
    }

    /// Lookups that found an expired entry.
    pub fn expirations(&self) -> u64 {
        self.inner.expirations.load(Ordering::Relaxed)
    }

    /// Entries evicted to respect the size limit.
    pub fn evictions(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            expirations: self.expirations(),
            evictions: self.evictions(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        self.inner.expirations.store(0, Ordering::Relaxed);
        self.inner.evictions.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups for absent keys
    pub misses: u64,
    /// Lookups that found an expired entry
    pub expirations: u64,
    /// Entries evicted to respect the size limit
    pub evictions: u64,
}

impl CacheMetricsSnapshot {
    /// Total lookups (hits, misses and expired).
    pub fn lookups(&self) -> u64 {
        self.hits
            .saturating_add(self.misses)
            .saturating_add(self.expirations)
    }

    /// Calculate the hit rate (0.0 to 1.0).
    ///
    /// Expired lookups count as misses. Returns 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
