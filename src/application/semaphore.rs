//! Bounded-concurrency gate.
//!
//! Callers beyond the limit wait in a FIFO queue. A released permit is handed
//! straight to the head waiter instead of going back to a shared pool, so a
//! late `try_acquire` can never overtake a queued caller.

use crate::application::lock;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Debug)]
struct Waiter {
    id: u64,
    grant: oneshot::Sender<SemaphorePermit>,
}

#[derive(Debug)]
struct SemaphoreState {
    limit: usize,
    active: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SemaphoreState>,
}

/// Counting semaphore with strict FIFO fairness.
///
/// Cloning yields another handle to the same semaphore.
///
/// # Example
/// ```
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// use flowguard::Semaphore;
///
/// let semaphore = Semaphore::new(2);
///
/// let first = semaphore.acquire().await;
/// let second = semaphore.acquire().await;
/// assert_eq!(semaphore.active(), 2);
/// assert!(semaphore.try_acquire().is_none());
///
/// drop(first);
/// assert_eq!(semaphore.active(), 1);
///
/// let doubled = semaphore.run(|| async { 21 * 2 }).await;
/// assert_eq!(doubled, 42);
/// second.release();
/// assert_eq!(semaphore.active(), 0);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Semaphore {
    shared: Arc<Shared>,
}

impl Semaphore {
    /// Create a semaphore admitting `concurrency` holders at once.
    ///
    /// `concurrency` is clamped to at least 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SemaphoreState {
                    limit: concurrency.max(1),
                    active: 0,
                    waiters: VecDeque::new(),
                    next_waiter_id: 0,
                }),
            }),
        }
    }

    /// Wait for a permit.
    ///
    /// Resolves immediately when a permit is free; otherwise queues behind
    /// every earlier caller. Dropping the returned future before it resolves
    /// gives up the place in the queue.
    pub async fn acquire(&self) -> SemaphorePermit {
        loop {
            let (id, receiver) = {
                let mut state = lock(&self.shared.state);
                if state.active < state.limit && state.waiters.is_empty() {
                    state.active += 1;
                    return SemaphorePermit::new(Arc::clone(&self.shared));
                }

                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                let (grant, receiver) = oneshot::channel();
                state.waiters.push_back(Waiter { id, grant });
                tracing::trace!(waiter = id, queued = state.waiters.len(), "waiting for permit");
                (id, receiver)
            };

            let mut pending = PendingAcquire {
                shared: Arc::clone(&self.shared),
                id,
                receiver,
                finished: false,
            };
            let granted = (&mut pending.receiver).await;
            pending.finished = true;

            match granted {
                Ok(permit) => return permit,
                // The grant was dropped without being sent; queue again.
                Err(_) => continue,
            }
        }
    }

    /// Take a permit only if one is free right now and nobody is queued.
    pub fn try_acquire(&self) -> Option<SemaphorePermit> {
        let mut state = lock(&self.shared.state);
        if state.active < state.limit && state.waiters.is_empty() {
            state.active += 1;
            Some(SemaphorePermit::new(Arc::clone(&self.shared)))
        } else {
            None
        }
    }

    /// Run `f` while holding a permit.
    ///
    /// The permit is released however the future ends: normal completion,
    /// an `Err` output, a panic, or the `run` future being dropped. The output
    /// of `f` is returned unchanged.
    pub async fn run<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _permit = self.acquire().await;
        f().await
    }

    /// Permits currently held.
    pub fn active(&self) -> usize {
        lock(&self.shared.state).active
    }

    /// Callers currently queued for a permit.
    pub fn waiting(&self) -> usize {
        lock(&self.shared.state).waiters.len()
    }

    /// Maximum concurrent holders.
    pub fn limit(&self) -> usize {
        lock(&self.shared.state).limit
    }
}

/// A held permit. Released when dropped or via [`SemaphorePermit::release`].
#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct SemaphorePermit {
    shared: Option<Arc<Shared>>,
}

impl SemaphorePermit {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Release the permit now.
    pub fn release(self) {
        drop(self);
    }

    /// Forget the permit without releasing it. Only used while the state lock
    /// is held and the permit's slot has already been accounted for.
    fn disarm(mut self) {
        self.shared = None;
    }
}

impl Drop for SemaphorePermit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            release(&shared);
        }
    }
}

fn release(shared: &Arc<Shared>) {
    let mut state = lock(&shared.state);

    while let Some(waiter) = state.waiters.pop_front() {
        match waiter.grant.send(SemaphorePermit::new(Arc::clone(shared))) {
            Ok(()) => {
                tracing::trace!(waiter = waiter.id, "permit handed to waiter");
                return;
            }
            // Receiver is gone; the slot stays counted and goes to the next waiter.
            Err(permit) => permit.disarm(),
        }
    }

    state.active = state.active.saturating_sub(1);
}

/// An enqueued `acquire` call. If dropped before completion, it removes its
/// waiter from the queue, or passes on a permit that was granted too late.
struct PendingAcquire {
    shared: Arc<Shared>,
    id: u64,
    receiver: oneshot::Receiver<SemaphorePermit>,
    finished: bool,
}

impl Drop for PendingAcquire {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let granted = {
            let mut state = lock(&self.shared.state);
            if let Some(position) = state.waiters.iter().position(|w| w.id == self.id) {
                state.waiters.remove(position);
                tracing::trace!(waiter = self.id, "abandoned waiter removed");
                None
            } else {
                self.receiver.try_recv().ok()
            }
        };

        // Released outside the lock: dropping a permit takes it again.
        drop(granted);
    }
}
