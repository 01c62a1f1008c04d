//! Tokio-backed timer adapter.
//!
//! Each scheduled wake is a spawned task that sleeps for the requested delay
//! and then runs its callback. Cancelling aborts the task.

use crate::application::ports::{ScheduledWake, Timer, WakeTask};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

/// Timer that schedules wakes on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    /// Use the runtime the caller is currently running on.
    ///
    /// # Errors
    /// Fails when called outside of a tokio runtime context.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::from_handle)
    }

    /// Use an explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay_ms: u64, task: WakeTask) -> Box<dyn ScheduledWake> {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            task();
        });
        Box::new(TokioWake { join })
    }
}

/// Wake scheduled on a tokio runtime.
#[derive(Debug)]
struct TokioWake {
    join: JoinHandle<()>,
}

impl ScheduledWake for TokioWake {
    fn cancel(&self) {
        self.join.abort();
    }
}
