//! Mock timer for testing.

use crate::application::ports::{Clock, ScheduledWake, Timer, WakeTask};
use crate::infrastructure::mocks::MockClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct PendingWake {
    due_ms: u64,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: WakeTask,
}

#[derive(Default)]
struct TimerQueue {
    next_seq: u64,
    pending: Vec<PendingWake>,
}

/// Mock timer driven by a [`MockClock`].
///
/// Scheduled tasks only run when the test advances time through
/// [`MockTimer::advance`]. Tasks run in due order, and the shared clock reads
/// exactly each task's due time while it runs.
///
/// ```
/// use flowguard::application::ports::{Clock, Timer};
/// use flowguard::infrastructure::mocks::{MockClock, MockTimer};
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// let clock = MockClock::new(0);
/// let timer = MockTimer::new(clock.clone());
/// let fired_at = Arc::new(AtomicU64::new(0));
///
/// let seen = Arc::clone(&fired_at);
/// let task_clock = clock.clone();
/// let _wake = timer.schedule(40, Box::new(move || {
///     seen.store(task_clock.now_millis(), Ordering::SeqCst);
/// }));
///
/// timer.advance_ms(100);
/// assert_eq!(fired_at.load(Ordering::SeqCst), 40);
/// assert_eq!(clock.now_millis(), 100);
/// ```
#[derive(Clone)]
pub struct MockTimer {
    clock: MockClock,
    queue: Arc<Mutex<TimerQueue>>,
}

impl MockTimer {
    /// Create a timer reading and advancing `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(TimerQueue::default())),
        }
    }

    /// The clock this timer drives.
    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    /// Number of scheduled wakes that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|wake| !wake.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Advance time by a duration, firing every wake that comes due.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis().try_into().unwrap_or(u64::MAX));
    }

    /// Advance time by `ms` milliseconds, firing every wake that comes due.
    ///
    /// Tasks scheduled by a firing task are honoured within the same advance
    /// if they come due before the target time.
    pub fn advance_ms(&self, ms: u64) {
        let target = self.clock.now_millis().saturating_add(ms);

        while let Some(wake) = self.pop_due(target) {
            if wake.due_ms > self.clock.now_millis() {
                self.clock.set(wake.due_ms);
            }
            (wake.task)();
        }

        self.clock.set(target);
    }

    fn pop_due(&self, target: u64) -> Option<PendingWake> {
        let mut queue = self.lock();
        queue
            .pending
            .retain(|wake| !wake.cancelled.load(Ordering::SeqCst));
        let index = queue
            .pending
            .iter()
            .enumerate()
            .filter(|(_, wake)| wake.due_ms <= target)
            .min_by_key(|(_, wake)| (wake.due_ms, wake.seq))
            .map(|(index, _)| index)?;
        Some(queue.pending.swap_remove(index))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerQueue> {
        self.queue
            .lock()
            .expect("MockTimer mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl std::fmt::Debug for MockTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTimer")
            .field("clock", &self.clock)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Timer for MockTimer {
    fn schedule(&self, delay_ms: u64, task: WakeTask) -> Box<dyn ScheduledWake> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut queue = self.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(PendingWake {
            due_ms: self.clock.now_millis().saturating_add(delay_ms),
            seq,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        Box::new(MockWake { cancelled })
    }
}

#[derive(Debug)]
struct MockWake {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledWake for MockWake {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
