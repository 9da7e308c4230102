//! Fixed-capacity key/value cache with least-recently-used eviction.
//!
//! Entries live in a slot arena; the recency list links slots by index
//! rather than by reference. Once the cache is full, the least recently used
//! slot is reused in place for the incoming entry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

use crate::error::{KeygateError, Result};

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A bounded map that evicts the least recently used entry when full.
///
/// Both `get` and `put` count as a use. Not synchronized; wrap it in a lock
/// to share it between threads.
pub struct LruCache<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(KeygateError::Config(
                "cache capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            head: None,
            tail: None,
        })
    }

    /// Look up `key` and mark it as most recently used.
    ///
    /// Returns `None` on a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.slots[idx].value)
    }

    /// Look up `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&idx| &self.slots[idx].value)
    }

    /// Insert or update `key` and mark it as most recently used.
    ///
    /// If a new key arrives while the cache is full, the least recently used
    /// entry is evicted and returned.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            self.slots[idx].value = value;
            self.move_to_front(idx);
            return None;
        }

        if self.slots.len() < self.capacity {
            let idx = self.slots.len();
            self.slots.push(Slot {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.attach_front(idx);
            self.index.insert(key, idx);
            return None;
        }

        // Full: reuse the tail slot
        let idx = self.tail?;
        self.detach(idx);

        let slot = &mut self.slots[idx];
        let old_key = std::mem::replace(&mut slot.key, key.clone());
        let old_value = std::mem::replace(&mut slot.value, value);

        self.index.remove(&old_key);
        self.index.insert(key, idx);
        self.attach_front(idx);

        trace!(slot = idx, capacity = self.capacity, "Evicted least recently used entry");
        Some((old_key, old_value))
    }

    /// Iterate entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let slot = &self.slots[idx];
            cursor = slot.next;
            Some((&slot.key, &slot.value))
        })
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = &self.slots[idx];
            (slot.prev, slot.next)
        };

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        let slot = &mut self.slots[idx];
        slot.prev = None;
        slot.next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = &mut self.slots[idx];
            slot.prev = None;
            slot.next = old_head;
        }

        match old_head {
            Some(h) => self.slots[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(cache: &LruCache<i32, V>) -> Vec<i32> {
        cache.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LruCache::<i32, i32>::new(0).err().unwrap();
        assert!(matches!(err, KeygateError::Config(_)));
    }

    #[test]
    fn test_get_miss() {
        let mut cache: LruCache<i32, i32> = LruCache::new(2).unwrap();
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = LruCache::new(2).unwrap();
        assert_eq!(cache.put(1, 10), None);
        assert_eq!(cache.put(2, 20), None);

        assert_eq!(cache.get(&1), Some(&10));
        assert_eq!(cache.get(&2), Some(&20));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2).unwrap();
        cache.put(1, 1);
        cache.put(2, 2);

        // Touch 1 so 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some(&1));
        assert_eq!(cache.put(3, 3), Some((2, 2)));

        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(&1));
        assert_eq!(cache.get(&3), Some(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_update_promotes_without_evicting() {
        let mut cache = LruCache::new(2).unwrap();
        cache.put(1, 1);
        cache.put(2, 2);

        assert_eq!(cache.put(1, 100), None);
        assert_eq!(keys(&cache), vec![1, 2]);

        assert_eq!(cache.put(3, 3), Some((2, 2)));
        assert_eq!(cache.get(&1), Some(&100));
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = LruCache::new(2).unwrap();
        cache.put(1, 1);
        cache.put(2, 2);

        assert_eq!(cache.peek(&1), Some(&1));
        assert_eq!(cache.put(3, 3), Some((1, 1)));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = LruCache::new(1).unwrap();
        cache.put(1, 1);
        assert_eq!(cache.put(2, 2), Some((1, 1)));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&2));
        assert_eq!(keys(&cache), vec![2]);
    }

    #[test]
    fn test_recency_order() {
        let mut cache = LruCache::new(3).unwrap();
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");
        assert_eq!(keys(&cache), vec![3, 2, 1]);

        cache.get(&2);
        assert_eq!(keys(&cache), vec![2, 3, 1]);

        cache.get(&1);
        assert_eq!(keys(&cache), vec![1, 2, 3]);

        cache.put(4, "d");
        assert_eq!(keys(&cache), vec![4, 1, 2]);
    }

    #[test]
    fn test_string_keys_borrowed_lookup() {
        let mut cache: LruCache<String, u32> = LruCache::new(2).unwrap();
        cache.put("alpha".to_string(), 1);

        assert_eq!(cache.get("alpha"), Some(&1));
        assert_eq!(cache.peek("beta"), None);
    }
}
