//! Sliding-window request log.
//!
//! Keeps the timestamps of accepted requests inside a trailing window and
//! decides whether a new request fits. Unlike a fixed-window counter the
//! window never resets in discrete ticks, so there is no burst at window
//! boundaries.

use std::collections::VecDeque;
use std::time::Duration;

/// Outcome of evaluating a request against a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request was accepted (and recorded)
    pub allowed: bool,
    /// Milliseconds until the oldest blocking request leaves the window.
    /// Always 0 for accepted requests.
    pub retry_after_ms: u64,
    /// Requests still available in the current window
    pub remaining: usize,
}

impl RateDecision {
    /// Check if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request was denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// The retry hint as a `Duration`.
    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }
}

/// Log of accepted request timestamps within a trailing window.
///
/// # Example
/// ```
/// use flowguard::domain::window::SlidingWindow;
///
/// let mut window = SlidingWindow::new(2, 1000);
///
/// assert!(window.consume(1000).allowed);
/// assert!(window.consume(1300).allowed);
///
/// let denied = window.consume(1400);
/// assert!(!denied.allowed);
/// assert_eq!(denied.retry_after_ms, 600);
///
/// // The t=1000 entry falls out once the cutoff passes it
/// assert!(window.consume(2001).allowed);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    max_requests: usize,
    window_ms: u64,
    timestamps: VecDeque<u64>,
}

impl SlidingWindow {
    /// Create a new window.
    ///
    /// Both `max_requests` and `window_ms` are clamped to at least 1.
    pub fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window_ms: window_ms.max(1),
            timestamps: VecDeque::new(),
        }
    }

    /// Maximum accepted requests per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Drop timestamps strictly older than `now - window_ms`.
    ///
    /// A timestamp sitting exactly on the cutoff is kept.
    fn prune(&mut self, now: u64) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_sub(oldest) > self.window_ms {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evaluate a request arriving at `now`, recording it if accepted.
    pub fn consume(&mut self, now: u64) -> RateDecision {
        self.prune(now);

        if self.timestamps.len() >= self.max_requests {
            let retry_after_ms = self
                .timestamps
                .front()
                .map(|&oldest| oldest.saturating_add(self.window_ms).saturating_sub(now))
                .unwrap_or(0);
            return RateDecision {
                allowed: false,
                retry_after_ms,
                remaining: 0,
            };
        }

        self.timestamps.push_back(now);
        RateDecision {
            allowed: true,
            retry_after_ms: 0,
            remaining: self.max_requests.saturating_sub(self.timestamps.len()),
        }
    }

    /// Number of requests live in the window at `now`.
    pub fn count(&mut self, now: u64) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    /// Whether the window holds no timestamps at all (without pruning).
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Forget every recorded request.
    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}
