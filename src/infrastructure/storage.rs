//! Storage implementations for keyed state.
//!
//! Provides concurrent, sharded storage for per-key primitive state.

use crate::application::ports::Storage;
use dashmap::DashMap;
use std::hash::Hash;

/// Thread-safe sharded storage backed by DashMap.
///
/// DashMap locks individual shards instead of the whole map, so independent
/// keys rarely contend with each other.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, V, ahash::RandomState>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Send + Sync + std::fmt::Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut value_ref = self.map.entry(key).or_insert_with(factory);
        accessor(&mut value_ref)
    }

    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.map.get_mut(key).map(|mut value_ref| accessor(&mut value_ref))
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) {
        self.map.clear()
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.map.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_with_entry_mut_creates_once() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();

        storage.with_entry_mut("key", || 10, |v| *v += 1);
        storage.with_entry_mut("key", || 100, |v| *v += 1);

        assert_eq!(storage.with_existing_mut(&"key", |v| *v), Some(12));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_with_existing_mut_absent() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();
        assert_eq!(storage.with_existing_mut(&"missing", |v| *v), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_remove_and_retain() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();
        for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
            storage.with_entry_mut(key, || value, |_| ());
        }

        assert_eq!(Storage::remove(&storage, &"a"), Some(1));
        assert_eq!(Storage::remove(&storage, &"a"), None);
        assert_eq!(storage.with_existing_mut(&"a", |v| *v), None);

        Storage::retain(&storage, |_, v| *v > 2);
        assert_eq!(storage.with_existing_mut(&"c", |v| *v), Some(3));
        assert_eq!(storage.with_existing_mut(&"b", |v| *v), None);
        assert_eq!(Storage::len(&storage), 1);
    }

    #[test]
    fn test_clear() {
        let storage: ShardedStorage<&str, u32> = ShardedStorage::new();
        storage.with_entry_mut("key1", || 100, |_| ());
        storage.with_entry_mut("key2", || 200, |_| ());

        Storage::clear(&storage);
        assert!(Storage::is_empty(&storage));
    }

    #[test]
    fn test_remove_through_arc() {
        let storage: Arc<ShardedStorage<u32, u32>> = Arc::new(ShardedStorage::new());
        storage.with_entry_mut(1, || 5, |_| ());

        assert_eq!(Storage::remove(&storage, &1), Some(5));
        assert!(Storage::is_empty(&storage));
    }

    #[test]
    fn test_concurrent_access() {
        let storage: Arc<ShardedStorage<u32, u32>> = Arc::new(ShardedStorage::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let storage_clone = Arc::clone(&storage);
            handles.push(thread::spawn(move || {
                for key in 0..100 {
                    storage_clone.with_entry_mut(key, || 0, |v| *v += 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(Storage::len(&storage), 100);
        assert_eq!(storage.with_existing_mut(&7, |v| *v), Some(10));
    }
}
