//! # flowguard
//!
//! Concurrency and resilience primitives for services that call out to
//! rate-limited, flaky or slow dependencies.
//!
//! Every primitive is an independent, thread-safe object holding its own
//! state behind a single lock. They compose freely: a typical call path
//! checks a rate limiter, runs through a circuit breaker and holds a
//! semaphore permit while the request is in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowguard::{
//!     CircuitBreaker, CircuitBreakerConfig, RateLimiter, RateLimiterConfig, Semaphore,
//! };
//! use std::time::Duration;
//!
//! # async fn fetch() -> Result<String, std::io::Error> { Ok(String::new()) }
//! # async fn demo() {
//! let limiter = RateLimiter::new(RateLimiterConfig::new(60, Duration::from_secs(60)));
//! let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::default());
//! let semaphore = Semaphore::new(4);
//!
//! let decision = limiter.consume();
//! if decision.is_denied() {
//!     println!("rate limited, retry in {:?}", decision.retry_after());
//!     return;
//! }
//!
//! let _permit = semaphore.acquire().await;
//! match breaker.call_async(fetch).await {
//!     Ok(body) => println!("got {} bytes", body.len()),
//!     Err(err) => println!("request failed: {}", err),
//! }
//! # }
//! ```
//!
//! ## Primitives
//!
//! - **Semaphore**: bounded concurrency with strict FIFO waiters and
//!   cancellation-safe `acquire`
//! - **RateLimiter**: sliding-window log, no boundary bursts; `KeyedRateLimiter`
//!   keeps one window per key
//! - **LruCache**: bounded LRU map with optional TTL and hit/miss metrics
//! - **CircuitBreaker**: closed/open/half-open state machine with lazy recovery
//! - **Throttle**: leading call plus one coalesced trailing call per interval
//!
//! ## Time
//!
//! Time-driven primitives read milliseconds from a [`Clock`] port and the
//! throttle schedules trailing calls on a [`Timer`] port. Production code uses
//! [`SystemClock`] and [`TokioTimer`]; tests inject `MockClock` and `MockTimer`
//! from `infrastructure::mocks` (enable the `test-helpers` feature) to drive
//! time deterministically:
//!
//! ```rust
//! # #[cfg(feature = "test-helpers")]
//! # {
//! use flowguard::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use flowguard::infrastructure::mocks::MockClock;
//! use std::sync::Arc;
//!
//! let clock = MockClock::new(0);
//! let breaker = CircuitBreaker::with_clock(
//!     CircuitBreakerConfig::default()
//!         .with_failure_threshold(1)
//!         .with_reset_timeout_ms(1_000),
//!     Arc::new(clock.clone()),
//! );
//!
//! let _ = breaker.call(|| Err::<(), _>("unavailable"));
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! clock.advance_ms(1_000);
//! assert_eq!(breaker.state(), CircuitState::HalfOpen);
//! # }
//! ```
//!
//! ## Logging
//!
//! The primitives emit `tracing` events (circuit transitions at `warn`/`info`,
//! rejections and evictions at `debug`, scheduling at `trace`). Install any
//! subscriber to see them; none is installed by the library.
//!
//! ## Feature Flags
//!
//! - `async` (default): `TokioTimer` and the default throttle timer
//! - `test-helpers`: `infrastructure::mocks`
//! - `serde`: `Serialize`/`Deserialize` for the config structs

// Domain layer - pure algorithms
pub mod domain;

// Application layer - thread-safe primitives and ports
pub mod application;

// Infrastructure layer - clock, storage and timer adapters
pub mod infrastructure;

// Re-export main types for convenience
pub use domain::{
    circuit::CircuitState,
    window::{RateDecision, SlidingWindow},
};

pub use application::{
    cache::{CacheConfig, LruCache},
    circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitOpenError},
    keyed::KeyedRateLimiter,
    metrics::{CacheMetrics, CacheMetricsSnapshot},
    ports::{Clock, ScheduledWake, Storage, Timer},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    semaphore::{Semaphore, SemaphorePermit},
    throttle::{BuildError, Throttle, ThrottleBuilder},
};

pub use infrastructure::{
    clock::{FnClock, SystemClock},
    storage::ShardedStorage,
};

#[cfg(feature = "async")]
pub use infrastructure::timer::TokioTimer;
