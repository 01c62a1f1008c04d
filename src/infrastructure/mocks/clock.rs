//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of time-window arithmetic.
///
/// # Examples
///
/// ```
/// use flowguard::infrastructure::mocks::MockClock;
/// use flowguard::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new(1_000);
///
/// // Time starts at the specified millisecond
/// assert_eq!(clock.now_millis(), 1_000);
///
/// // Advance time explicitly
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now_millis(), 11_000);
///
/// // Or set to a specific millisecond
/// clock.set(100_000);
/// assert_eq!(clock.now_millis(), 100_000);
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
///
/// ```
/// use flowguard::infrastructure::mocks::MockClock;
/// use flowguard::application::ports::Clock;
/// use std::thread;
///
/// let clock = MockClock::new(0);
/// let clock_clone = clock.clone();
///
/// let handle = thread::spawn(move || {
///     clock_clone.advance_ms(5);
/// });
///
/// handle.join().unwrap();
/// assert_eq!(clock.now_millis(), 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a mock clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis().try_into().unwrap_or(u64::MAX));
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to a specific millisecond.
    pub fn set(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock() {
        let clock = MockClock::new(0);
        assert_eq!(clock.now_millis(), 0);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now_millis(), 10_000);

        clock.set(100_000);
        assert_eq!(clock.now_millis(), 100_000);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new(7);
        let other = clock.clone();
        other.advance_ms(3);
        assert_eq!(clock.now_millis(), 10);
    }
}
