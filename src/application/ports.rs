//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::Debug;
use std::hash::Hash;

/// Port for obtaining current time.
///
/// Returns milliseconds on a monotonic timeline. Every primitive in this crate
/// treats the clock as non-decreasing. Infrastructure provides concrete
/// implementations (SystemClock, FnClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Current time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Task run by a [`Timer`] once its delay has passed.
pub type WakeTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a task scheduled on a [`Timer`].
pub trait ScheduledWake: Send + Debug {
    /// Prevent the task from running if it has not started yet.
    ///
    /// Cancelling an already-fired wake is a no-op.
    fn cancel(&self);
}

/// Port for scheduling delayed work.
///
/// A timer may run a task later than requested, but never earlier, and never
/// before `schedule` has returned.
/// Infrastructure provides concrete implementations (TokioTimer, MockTimer).
pub trait Timer: Send + Sync + Debug {
    /// Run `task` after `delay_ms` milliseconds.
    fn schedule(&self, delay_ms: u64, task: WakeTask) -> Box<dyn ScheduledWake>;
}

/// Port for concurrent key-value storage.
///
/// This abstraction allows keyed primitives to store per-key state without
/// depending on a specific concurrent map. Infrastructure provides concrete
/// implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Access an existing entry mutably, without creating it.
    ///
    /// Returns `None` if the key is absent.
    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R;

    /// Remove an entry, returning its value if it was present.
    fn remove(&self, key: &K) -> Option<V>;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool;
}

impl<K, V, T> Storage<K, V> for std::sync::Arc<T>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
    T: Storage<K, V>,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_existing_mut(key, accessor)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        (**self).retain(f)
    }
}
