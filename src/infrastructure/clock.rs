//! Clock adapters for time operations.
//!
//! Provides SystemClock for production use and FnClock for plugging in any
//! closure as a time source.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! flowguard = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::Instant;

/// Monotonic clock measuring milliseconds since its own creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a new system clock starting at zero.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
    }
}

/// Clock backed by a closure returning milliseconds.
///
/// ```
/// use flowguard::application::ports::Clock;
/// use flowguard::FnClock;
///
/// let clock = FnClock::new(|| 42);
/// assert_eq!(clock.now_millis(), 42);
/// ```
pub struct FnClock<F> {
    source: F,
}

impl<F> FnClock<F>
where
    F: Fn() -> u64 + Send + Sync,
{
    /// Wrap a time source.
    pub fn new(source: F) -> Self {
        Self { source }
    }
}

impl<F> std::fmt::Debug for FnClock<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClock")
            .field("source", &"<fn>")
            .finish()
    }
}

impl<F> Clock for FnClock<F>
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_millis(&self) -> u64 {
        (self.source)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock::new();
        let t1 = clock.now_millis();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now_millis();

        assert!(t2 >= t1 + 10);
    }

    #[test]
    fn test_fn_clock() {
        let ticks = Arc::new(AtomicU64::new(5));
        let source = Arc::clone(&ticks);
        let clock = FnClock::new(move || source.load(Ordering::SeqCst));

        assert_eq!(clock.now_millis(), 5);
        ticks.store(99, Ordering::SeqCst);
        assert_eq!(clock.now_millis(), 99);
        assert_eq!(format!("{:?}", clock), "FnClock { source: \"<fn>\" }");
    }
}
