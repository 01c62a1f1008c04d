//! Sliding-window rate limiter.
//!
//! Thread-safe wrapper around [`SlidingWindow`] reading time from a `Clock`.

use crate::application::lock;
use crate::application::ports::Clock;
use crate::domain::window::{RateDecision, SlidingWindow};
use crate::infrastructure::clock::SystemClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration shared by [`RateLimiter`] and
/// [`KeyedRateLimiter`](crate::KeyedRateLimiter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateLimiterConfig {
    /// Requests accepted per window (clamped to at least 1)
    pub max_requests: usize,
    /// Window length in milliseconds (clamped to at least 1)
    pub window_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

impl RateLimiterConfig {
    /// Create a config accepting `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: window.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    /// Set the request budget.
    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the window length in milliseconds.
    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub(crate) fn window(&self) -> SlidingWindow {
        SlidingWindow::new(self.max_requests, self.window_ms)
    }
}

/// Sliding-window rate limiter.
///
/// # Example
/// ```
/// use flowguard::{RateLimiter, RateLimiterConfig};
/// use flowguard::infrastructure::mocks::MockClock;
/// use std::sync::Arc;
///
/// let clock = MockClock::new(1000);
/// let limiter = RateLimiter::with_clock(
///     RateLimiterConfig::default().with_max_requests(2).with_window_ms(1000),
///     Arc::new(clock.clone()),
/// );
///
/// assert!(limiter.consume().allowed);
/// clock.set(1300);
/// assert!(limiter.consume().allowed);
/// clock.set(1400);
/// let denied = limiter.consume();
/// assert!(!denied.allowed);
/// assert_eq!(denied.retry_after_ms, 600);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<SlidingWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Mutex::new(config.window()),
            clock,
        }
    }

    /// Evaluate one request now, recording it if allowed.
    pub fn consume(&self) -> RateDecision {
        let now = self.clock.now_millis();
        let decision = lock(&self.window).consume(now);
        if decision.is_denied() {
            tracing::debug!(
                retry_after_ms = decision.retry_after_ms,
                "rate limit exceeded"
            );
        }
        decision
    }

    /// Requests currently inside the window.
    pub fn count(&self) -> usize {
        let now = self.clock.now_millis();
        lock(&self.window).count(now)
    }

    /// Forget every recorded request.
    pub fn reset(&self) {
        lock(&self.window).reset();
    }

    /// Requests accepted per window.
    pub fn max_requests(&self) -> usize {
        lock(&self.window).max_requests()
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        lock(&self.window).window_ms()
    }
}
