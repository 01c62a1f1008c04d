//! Keyed sliding-window rate limiting.
//!
//! One independent window per key (tenant, provider, endpoint), created on
//! first use. Windows live in a `Storage` port so the map can be sharded.

use crate::application::ports::{Clock, Storage};
use crate::application::rate_limiter::RateLimiterConfig;
use crate::domain::window::{RateDecision, SlidingWindow};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::storage::ShardedStorage;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Rate limiter keeping a separate sliding window per key.
///
/// # Example
/// ```
/// use flowguard::{KeyedRateLimiter, RateLimiterConfig};
///
/// let limiter = KeyedRateLimiter::new(
///     RateLimiterConfig::default().with_max_requests(1).with_window_ms(60_000),
/// );
///
/// assert!(limiter.consume("openai").allowed);
/// assert!(!limiter.consume("openai").allowed);
/// // Other keys are unaffected
/// assert!(limiter.consume("anthropic").allowed);
/// ```
#[derive(Debug)]
pub struct KeyedRateLimiter<K, S = Arc<ShardedStorage<K, SlidingWindow>>>
where
    K: Hash + Eq + Clone + Send + Sync,
    S: Storage<K, SlidingWindow>,
{
    storage: S,
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    _key: PhantomData<fn(K)>,
}

impl<K> KeyedRateLimiter<K>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
{
    /// Create a keyed limiter on sharded storage and the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a keyed limiter on sharded storage reading time from `clock`.
    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_storage(Arc::new(ShardedStorage::new()), config, clock)
    }
}

impl<K, S> KeyedRateLimiter<K, S>
where
    K: Hash + Eq + Clone + Send + Sync,
    S: Storage<K, SlidingWindow>,
{
    /// Create a keyed limiter on a custom storage backend.
    pub fn with_storage(storage: S, config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            config,
            clock,
            _key: PhantomData,
        }
    }

    /// Evaluate one request for `key`, recording it if allowed.
    pub fn consume(&self, key: K) -> RateDecision {
        let now = self.clock.now_millis();
        let config = self.config;
        let decision = self
            .storage
            .with_entry_mut(key, || config.window(), |window| window.consume(now));
        if decision.is_denied() {
            tracing::debug!(
                retry_after_ms = decision.retry_after_ms,
                "keyed rate limit exceeded"
            );
        }
        decision
    }

    /// Requests currently inside `key`'s window; 0 for unknown keys.
    pub fn count(&self, key: &K) -> usize {
        let now = self.clock.now_millis();
        self.storage
            .with_existing_mut(key, |window| window.count(now))
            .unwrap_or(0)
    }

    /// Forget the requests recorded for `key` and stop tracking it.
    pub fn reset(&self, key: &K) {
        self.storage.remove(key);
    }

    /// Forget every key.
    pub fn reset_all(&self) {
        self.storage.clear();
    }

    /// Drop keys whose window is empty, returning how many were dropped.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.storage.len();
        self.storage.retain(|_, window| window.count(now) > 0);
        let purged = before.saturating_sub(self.storage.len());
        if purged > 0 {
            tracing::debug!(purged, remaining = self.storage.len(), "purged idle rate limit keys");
        }
        purged
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The configuration applied to every key.
    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }
}
