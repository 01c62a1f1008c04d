//! Circuit breaker state machine.
//!
//! Pure transition logic with time passed in explicitly. The `Open -> HalfOpen`
//! edge is never stored ahead of time: every observation recomputes it from
//! `now` and `opened_at`, so no timer is needed to keep the machine correct.

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Operating normally, calls pass through
    Closed,
    /// Failing fast, calls are rejected without running
    Open,
    /// Reset timeout elapsed, the next calls probe the protected resource
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// What a recorded outcome did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State unchanged
    Stay,
    /// Circuit tripped (from closed or from a failed probe)
    Opened,
    /// A probe succeeded and the circuit closed again
    Closed,
}

/// Mutable breaker state together with its fixed thresholds.
#[derive(Debug, Clone)]
pub struct CircuitMachine {
    failure_threshold: u32,
    reset_timeout_ms: u64,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<u64>,
}

impl CircuitMachine {
    /// Create a closed machine. `failure_threshold` is clamped to at least 1.
    pub fn new(failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout_ms,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Failures needed to trip the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time the circuit stays open before probing.
    pub fn reset_timeout_ms(&self) -> u64 {
        self.reset_timeout_ms
    }

    /// Consecutive failures recorded so far.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When the circuit last opened, if it is open or half-open.
    pub fn opened_at(&self) -> Option<u64> {
        self.opened_at
    }

    fn elapsed_since_open(&self, now: u64) -> u64 {
        self.opened_at
            .map(|opened| now.saturating_sub(opened))
            .unwrap_or(0)
    }

    /// The state as seen at `now`, without mutating anything.
    pub fn state_at(&self, now: u64) -> CircuitState {
        match self.state {
            CircuitState::Open if self.elapsed_since_open(now) >= self.reset_timeout_ms => {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    /// Apply a pending `Open -> HalfOpen` transition and return the state.
    pub fn resolve(&mut self, now: u64) -> CircuitState {
        self.state = self.state_at(now);
        self.state
    }

    /// Milliseconds until an open circuit starts probing; 0 otherwise.
    pub fn retry_after_ms(&self, now: u64) -> u64 {
        match self.state_at(now) {
            CircuitState::Open => self
                .reset_timeout_ms
                .saturating_sub(self.elapsed_since_open(now)),
            _ => 0,
        }
    }

    /// Record a successful call at `now`.
    pub fn on_success(&mut self, now: u64) -> Transition {
        match self.resolve(now) {
            CircuitState::HalfOpen => {
                self.close();
                Transition::Closed
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                Transition::Stay
            }
            // A call admitted before the circuit tripped finished late.
            CircuitState::Open => Transition::Stay,
        }
    }

    /// Record a failed call at `now`.
    pub fn on_failure(&mut self, now: u64) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match self.resolve(now) {
            CircuitState::HalfOpen => {
                self.trip(now);
                Transition::Opened
            }
            CircuitState::Closed if self.consecutive_failures >= self.failure_threshold => {
                self.trip(now);
                Transition::Opened
            }
            CircuitState::Closed | CircuitState::Open => Transition::Stay,
        }
    }

    /// Force the machine back to its initial state.
    pub fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn trip(&mut self, now: u64) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
    }
}
