//! Circuit breaker for failing fast against an unhealthy dependency.
//!
//! After `failure_threshold` consecutive failures the circuit opens and calls
//! are rejected without running. Once `reset_timeout_ms` has elapsed the
//! circuit is half-open and the next calls probe the dependency: a success
//! closes it, a failure opens it again.

use crate::application::lock;
use crate::application::ports::Clock;
use crate::domain::circuit::{CircuitMachine, CircuitState, Transition};
use crate::infrastructure::clock::SystemClock;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit (at least 1)
    pub failure_threshold: u32,
    /// Milliseconds to stay open before attempting recovery
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config opening after `failure_threshold` failures for `reset_timeout`.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout_ms: reset_timeout.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    /// Open the circuit after this many consecutive failures.
    pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    /// Stay open for `reset_timeout` before letting probe calls through.
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout_ms = reset_timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Stay open for `reset_timeout_ms` milliseconds before letting probe calls through.
    pub fn with_reset_timeout_ms(mut self, reset_timeout_ms: u64) -> Self {
        self.reset_timeout_ms = reset_timeout_ms;
        self
    }
}

/// Returned instead of running the operation while the circuit is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpenError {
    /// Milliseconds until the circuit starts probing again
    pub retry_after_ms: u64,
}

impl CircuitOpenError {
    /// Time until the circuit starts probing again.
    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }
}

impl fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "circuit breaker is open, retry after {}ms",
            self.retry_after_ms
        )
    }
}

impl std::error::Error for CircuitOpenError {}

/// Error from an operation run through a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit was open; the operation did not run
    Open(CircuitOpenError),
    /// The operation ran and failed with this error
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open(_))
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(err) => Some(err),
            BreakerError::Open(_) => None,
        }
    }
}

impl<E> From<CircuitOpenError> for BreakerError<E> {
    fn from(err: CircuitOpenError) -> Self {
        BreakerError::Open(err)
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open(err) => err.fmt(f),
            BreakerError::Inner(err) => err.fmt(f),
        }
    }
}

impl<E> std::error::Error for BreakerError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Open(_) => None,
            BreakerError::Inner(err) => Some(err),
        }
    }
}

/// Circuit breaker protecting calls to a fallible dependency.
///
/// Concurrent callers in the half-open state are all admitted as probes.
///
/// # Example
/// ```
/// use flowguard::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
///
/// let breaker = CircuitBreaker::with_config(
///     CircuitBreakerConfig::default().with_failure_threshold(1),
/// );
///
/// let result: Result<(), _> = breaker.call(|| Err("connection refused"));
/// assert_eq!(result.unwrap_err().into_inner(), Some("connection refused"));
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let rejected = breaker.call(|| Ok::<_, &str>(()));
/// assert!(matches!(rejected, Err(BreakerError::Open(_))));
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    machine: Mutex<CircuitMachine>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a circuit breaker reading time from `clock`.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            machine: Mutex::new(CircuitMachine::new(
                config.failure_threshold,
                config.reset_timeout_ms,
            )),
            clock,
        }
    }

    /// Run `f` unless the circuit is open, recording its outcome.
    ///
    /// A panic inside `f` is recorded as a failure and then resumed.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.check()?;

        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
            Err(payload) => {
                self.record_failure();
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of [`call`](Self::call).
    ///
    /// No lock is held while the future runs. If the future is dropped
    /// before completing, nothing is recorded.
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check()?;

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Check whether a call may proceed now.
    ///
    /// Applies a pending open to half-open transition. Callers using this
    /// directly must report the outcome with [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure).
    pub fn check(&self) -> Result<(), CircuitOpenError> {
        let now = self.clock.now_millis();
        let mut machine = lock(&self.machine);
        match machine.resolve(now) {
            CircuitState::Open => {
                let err = CircuitOpenError {
                    retry_after_ms: machine.retry_after_ms(now),
                };
                drop(machine);
                tracing::debug!(
                    retry_after_ms = err.retry_after_ms,
                    "circuit breaker rejected call"
                );
                Err(err)
            }
            CircuitState::HalfOpen => {
                drop(machine);
                tracing::trace!("circuit breaker admitting probe");
                Ok(())
            }
            CircuitState::Closed => Ok(()),
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        let now = self.clock.now_millis();
        let transition = lock(&self.machine).on_success(now);
        if transition == Transition::Closed {
            tracing::info!("circuit breaker closed after successful probe");
        }
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        let (transition, failures, reset_timeout_ms) = {
            let mut machine = lock(&self.machine);
            let transition = machine.on_failure(now);
            (
                transition,
                machine.consecutive_failures(),
                machine.reset_timeout_ms(),
            )
        };
        if transition == Transition::Opened {
            tracing::warn!(failures, reset_timeout_ms, "circuit breaker opened");
        }
    }

    /// Get the current circuit state.
    ///
    /// Reports `HalfOpen` once the reset timeout has elapsed, without
    /// changing the stored state.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now_millis();
        lock(&self.machine).state_at(now)
    }

    /// Get the number of consecutive failures.
    pub fn failures(&self) -> u32 {
        lock(&self.machine).consecutive_failures()
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        lock(&self.machine).close();
    }

    /// The thresholds this breaker was built with.
    pub fn config(&self) -> CircuitBreakerConfig {
        let machine = lock(&self.machine);
        CircuitBreakerConfig {
            failure_threshold: machine.failure_threshold(),
            reset_timeout_ms: machine.reset_timeout_ms(),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CircuitBreaker {
    /// Snapshot the current state into an independent breaker sharing the clock.
    fn clone(&self) -> Self {
        Self {
            machine: Mutex::new(lock(&self.machine).clone()),
            clock: Arc::clone(&self.clock),
        }
    }
}
