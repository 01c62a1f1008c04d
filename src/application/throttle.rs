//! Throttle: at most one invocation per interval.
//!
//! The first call in a quiet period runs immediately. Calls arriving inside
//! the interval are coalesced and a single trailing call runs when the
//! interval ends, with the most recent arguments.

use crate::application::lock;
use crate::application::ports::{Clock, ScheduledWake, Timer};
use crate::infrastructure::clock::SystemClock;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

/// Error returned when building a [`Throttle`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No timer was configured and no tokio runtime is available
    NoTimer,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::NoTimer => write!(
                f,
                "no timer configured and no tokio runtime available for trailing calls"
            ),
        }
    }
}

impl std::error::Error for BuildError {}

type Callback<A> = Box<dyn Fn(A) + Send + Sync + 'static>;

#[derive(Debug)]
struct ArmedWake {
    seq: u64,
    handle: Box<dyn ScheduledWake>,
}

struct State<A> {
    last_invoke: Option<u64>,
    pending: Option<A>,
    wake: Option<ArmedWake>,
    next_seq: u64,
}

impl<A> State<A> {
    fn disarm(&mut self) {
        if let Some(wake) = self.wake.take() {
            wake.handle.cancel();
        }
    }
}

struct Inner<A> {
    f: Callback<A>,
    interval_ms: u64,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    state: Mutex<State<A>>,
}

impl<A> Drop for Inner<A> {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .disarm();
    }
}

/// Rate-limits invocations of a function to one per interval.
///
/// Cloning yields another handle to the same throttle. Dropping the last
/// handle cancels any trailing call that has not run yet.
///
/// # Example
/// ```
/// use flowguard::Throttle;
/// use flowguard::infrastructure::mocks::{MockClock, MockTimer};
/// use std::sync::{Arc, Mutex};
///
/// let clock = MockClock::new(0);
/// let timer = MockTimer::new(clock.clone());
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let throttle = Throttle::builder(move |n: u32| sink.lock().unwrap().push(n))
///     .with_interval_ms(100)
///     .with_clock(Arc::new(clock.clone()))
///     .with_timer(Arc::new(timer.clone()))
///     .build()
///     .unwrap();
///
/// throttle.call(1); // runs now
/// throttle.call(2);
/// throttle.call(3); // replaces 2
///
/// timer.advance_ms(100);
/// assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
/// ```
pub struct Throttle<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for Throttle<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Throttle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Throttle")
            .field("interval_ms", &self.inner.interval_ms)
            .field("last_invoke", &state.last_invoke)
            .field("pending", &state.pending.is_some())
            .finish()
    }
}

impl<A: Send + 'static> Throttle<A> {
    /// Start building a throttle around `f`.
    pub fn builder<F>(f: F) -> ThrottleBuilder<A>
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        ThrottleBuilder::new(f)
    }

    /// Invoke now if the interval has passed, otherwise schedule a trailing
    /// call with these arguments.
    ///
    /// The function runs on the caller's thread for leading calls and on the
    /// timer's context for trailing calls. It is never run while the
    /// throttle's lock is held, so it may call back into the throttle.
    pub fn call(&self, args: A) {
        let inner = &self.inner;
        let now = inner.clock.now_millis();
        let mut state = lock(&inner.state);

        let elapsed = state
            .last_invoke
            .map_or(u64::MAX, |last| now.saturating_sub(last));

        if elapsed >= inner.interval_ms {
            state.disarm();
            state.pending = None;
            state.last_invoke = Some(now);
            drop(state);
            (inner.f)(args);
            return;
        }

        state.pending = Some(args);
        if state.wake.is_none() {
            let delay_ms = inner.interval_ms - elapsed;
            let seq = state.next_seq;
            state.next_seq = state.next_seq.wrapping_add(1);

            let weak = Arc::downgrade(inner);
            let handle = inner
                .timer
                .schedule(delay_ms, Box::new(move || fire(&weak, seq)));
            state.wake = Some(ArmedWake { seq, handle });
            tracing::trace!(delay_ms, "throttle scheduled trailing call");
        }
    }

    /// Drop the pending trailing call, if any, without invoking it.
    pub fn cancel(&self) {
        let mut state = lock(&self.inner.state);
        state.disarm();
        state.pending = None;
    }

    /// Run the pending trailing call now instead of waiting for the interval.
    ///
    /// No-op when nothing is pending.
    pub fn flush(&self) {
        let now = self.inner.clock.now_millis();
        let args = {
            let mut state = lock(&self.inner.state);
            let Some(args) = state.pending.take() else {
                return;
            };
            state.disarm();
            state.last_invoke = Some(now);
            args
        };
        (self.inner.f)(args);
    }

    /// Whether a trailing call is waiting to run.
    pub fn is_pending(&self) -> bool {
        lock(&self.inner.state).pending.is_some()
    }

    /// Minimum spacing between invocations.
    pub fn interval_ms(&self) -> u64 {
        self.inner.interval_ms
    }
}

fn fire<A>(weak: &Weak<Inner<A>>, seq: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let args = {
        let mut state = lock(&inner.state);
        // Superseded or cancelled wakes fire as no-ops
        match &state.wake {
            Some(wake) if wake.seq == seq => {}
            _ => return,
        }
        state.wake = None;
        let Some(args) = state.pending.take() else {
            return;
        };
        state.last_invoke = Some(inner.clock.now_millis());
        args
    };

    tracing::trace!("throttle running trailing call");
    (inner.f)(args);
}

/// Builder for constructing a [`Throttle`].
pub struct ThrottleBuilder<A> {
    f: Callback<A>,
    interval_ms: u64,
    clock: Option<Arc<dyn Clock>>,
    timer: Option<Arc<dyn Timer>>,
}

impl<A> fmt::Debug for ThrottleBuilder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleBuilder")
            .field("interval_ms", &self.interval_ms)
            .field("clock", &self.clock)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl<A: Send + 'static> ThrottleBuilder<A> {
    fn new<F>(f: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            f: Box::new(f),
            interval_ms: 0,
            clock: None,
            timer: None,
        }
    }

    /// Set the minimum spacing between invocations.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Set the minimum spacing between invocations in milliseconds.
    ///
    /// An interval of 0 disables throttling.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set a custom clock (defaults to `SystemClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the timer that runs trailing calls.
    ///
    /// Defaults to a `TokioTimer` on the current runtime.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Build the throttle.
    ///
    /// # Errors
    /// Returns `BuildError::NoTimer` if no timer was set and the caller is
    /// not inside a tokio runtime.
    pub fn build(self) -> Result<Throttle<A>, BuildError> {
        let timer = match self.timer {
            Some(timer) => timer,
            None => default_timer()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        Ok(Throttle {
            inner: Arc::new(Inner {
                f: self.f,
                interval_ms: self.interval_ms,
                clock,
                timer,
                state: Mutex::new(State {
                    last_invoke: None,
                    pending: None,
                    wake: None,
                    next_seq: 0,
                }),
            }),
        })
    }
}

#[cfg(feature = "async")]
fn default_timer() -> Result<Arc<dyn Timer>, BuildError> {
    crate::infrastructure::timer::TokioTimer::current()
        .map(|timer| Arc::new(timer) as Arc<dyn Timer>)
        .map_err(|_| BuildError::NoTimer)
}

#[cfg(not(feature = "async"))]
fn default_timer() -> Result<Arc<dyn Timer>, BuildError> {
    Err(BuildError::NoTimer)
}
