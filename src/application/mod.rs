//! Application layer - the thread-safe primitives.
//!
//! Each primitive wraps its domain state in a single mutex owned by the
//! instance, reads time through the `Clock` port and, for the throttle,
//! schedules trailing calls through the `Timer` port:
//! - Semaphore (bounded concurrency)
//! - Rate limiter and keyed rate limiter (sliding window)
//! - LRU cache with TTL
//! - Circuit breaker
//! - Throttle
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod cache;
pub mod circuit_breaker;
pub mod keyed;
pub mod metrics;
pub mod ports;
pub mod rate_limiter;
pub mod semaphore;
pub mod throttle;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock an instance mutex, recovering the state if a previous holder panicked.
///
/// Critical sections never run user code, so the guarded state is always
/// consistent even after a poisoning panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
