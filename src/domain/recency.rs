//! Recency-ordered map with optional per-entry expiry.
//!
//! Entries are ordered by a monotonically increasing access tick; the entry
//! with the smallest tick is the least recently used. Expiry is lazy: nothing
//! is swept in the background, an expired entry is only dropped when it is
//! looked up or pushed out by capacity pressure.

use ahash::AHashMap;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::Hash;

/// Result of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Live entry
    Hit(V),
    /// No entry under that key
    Miss,
    /// The entry existed but had expired
    Expired,
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expires_at: Option<u64>,
    tick: u64,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Bounded map evicting least recently used entries.
///
/// # Example
/// ```
/// use flowguard::domain::recency::RecencyMap;
///
/// let mut map = RecencyMap::new(2, 0);
/// map.insert("a", 1, 0);
/// map.insert("b", 2, 0);
/// map.get("a", 0); // "a" is now the most recent
/// map.insert("c", 3, 0); // evicts "b"
///
/// assert_eq!(map.keys(), vec!["a", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecencyMap<K, V> {
    max_size: usize,
    ttl_ms: u64,
    entries: AHashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
}

impl<K, V> RecencyMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a map holding at most `max_size` entries (clamped to 1).
    ///
    /// `ttl_ms == 0` disables expiry.
    pub fn new(max_size: usize, ttl_ms: u64) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl_ms,
            entries: AHashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    /// Capacity of the map.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Lifetime of entries in milliseconds, 0 when entries never expire.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Insert at the most recently used position, replacing any previous
    /// entry under `key`.
    ///
    /// Returns the keys evicted to make room, oldest first.
    pub fn insert(&mut self, key: K, value: V, now: u64) -> Vec<K> {
        if let Some(previous) = self.entries.remove(&key) {
            self.order.remove(&previous.tick);
        }

        let expires_at = (self.ttl_ms > 0).then(|| now.saturating_add(self.ttl_ms));
        let tick = self.tick();
        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                expires_at,
                tick,
            },
        );

        let mut evicted = Vec::new();
        while self.entries.len() > self.max_size {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.entries.remove(&oldest);
                    evicted.push(oldest);
                }
                None => break,
            }
        }
        evicted
    }

    /// Look up `key`, promoting live entries and dropping expired ones.
    pub fn get<Q>(&mut self, key: &Q, now: u64) -> Lookup<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(slot) => slot.is_expired(now),
        };

        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        let tick = self.tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                if let Some(k) = self.order.remove(&slot.tick) {
                    self.order.insert(tick, k);
                }
                slot.tick = tick;
                Lookup::Hit(&slot.value)
            }
            None => Lookup::Miss,
        }
    }

    /// Whether a live entry exists, without touching recency or removing
    /// expired entries.
    pub fn contains<Q>(&self, key: &Q, now: u64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .get(key)
            .is_some_and(|slot| !slot.is_expired(now))
    }

    /// Remove an entry, live or expired. Returns whether anything was removed.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.tick);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Physically stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in recency order, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        self.order.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_insertion() {
        let mut map = RecencyMap::new(2, 0);
        map.insert("a", 1, 0);
        map.insert("b", 2, 0);
        let evicted = map.insert("c", 3, 0);

        assert_eq!(evicted, vec!["a"]);
        assert_eq!(map.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_get_promotes() {
        let mut map = RecencyMap::new(2, 0);
        map.insert("a", 1, 0);
        map.insert("b", 2, 0);
        assert_eq!(map.get("a", 0), Lookup::Hit(&1));

        let evicted = map.insert("c", 3, 0);
        assert_eq!(evicted, vec!["b"]);
        assert_eq!(map.keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_contains_does_not_promote() {
        let mut map = RecencyMap::new(2, 0);
        map.insert("a", 1, 0);
        map.insert("b", 2, 0);
        assert!(map.contains("a", 0));

        map.insert("c", 3, 0);
        assert!(!map.contains("a", 0));
        assert_eq!(map.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_reinsert_moves_to_most_recent() {
        let mut map = RecencyMap::new(3, 0);
        map.insert("a", 1, 0);
        map.insert("b", 2, 0);
        map.insert("a", 10, 0);

        assert_eq!(map.keys(), vec!["b", "a"]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a", 0), Lookup::Hit(&10));
    }

    #[test]
    fn test_ttl_expiry_boundary() {
        let mut map = RecencyMap::new(10, 5000);
        map.insert("k", "v", 1000);

        assert!(map.contains("k", 5999));
        assert!(!map.contains("k", 6000));
        // contains never removes
        assert_eq!(map.len(), 1);

        assert_eq!(map.get("k", 6000), Lookup::Expired);
        assert_eq!(map.len(), 0);
        assert_eq!(map.get("k", 6000), Lookup::Miss);
    }

    #[test]
    fn test_expired_entries_count_until_touched() {
        let mut map = RecencyMap::new(10, 10);
        map.insert(1, (), 0);
        map.insert(2, (), 0);
        assert_eq!(map.len(), 2);
        assert!(!map.contains(&1, 100));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let mut map = RecencyMap::new(1, 0);
        map.insert("k", 1, 0);
        assert_eq!(map.get("k", u64::MAX), Lookup::Hit(&1));
    }

    #[test]
    fn test_capacity_one() {
        let mut map = RecencyMap::new(0, 0);
        assert_eq!(map.max_size(), 1);

        map.insert("a", 1, 0);
        assert_eq!(map.insert("b", 2, 0), vec!["a"]);
        assert_eq!(map.keys(), vec!["b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut map = RecencyMap::new(4, 0);
        map.insert("a".to_string(), 1, 0);
        map.insert("b".to_string(), 2, 0);

        assert!(map.remove("a"));
        assert!(!map.remove("a"));
        assert_eq!(map.keys(), vec!["b".to_string()]);

        map.clear();
        assert!(map.is_empty());
        assert!(map.keys().is_empty());
    }
}
