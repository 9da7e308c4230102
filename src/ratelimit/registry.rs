//! Concurrent key to counter mapping.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use super::counter::WindowCounter;

/// Maps keys to their window counters.
///
/// Entries are only ever added. Creation goes through the map's entry API,
/// which holds the shard lock for the whole check-and-insert, so concurrent
/// first requests for the same key always end up sharing one counter.
///
/// Counters are handed out as `Arc`s and the shard guard is dropped before
/// returning, so a caller holding a counter's own lock never blocks access to
/// other keys.
pub struct KeyRegistry<K> {
    counters: DashMap<K, Arc<WindowCounter>>,
}

impl<K> KeyRegistry<K>
where
    K: Eq + Hash,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Return the counter for `key`, creating it with `create` if absent.
    ///
    /// `create` runs at most once per key for the lifetime of the registry.
    pub fn get_or_create<Q, F>(&self, key: &Q, create: F) -> Arc<WindowCounter>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> WindowCounter,
    {
        // Steady state: a read lock on one shard, no key allocation
        if let Some(counter) = self.counters.get(key) {
            return Arc::clone(counter.value());
        }

        let entry = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(create()));
        Arc::clone(entry.value())
    }

    /// Return the counter for `key` without creating one.
    pub fn lookup<Q>(&self, key: &Q) -> Option<Arc<WindowCounter>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.counters.get(key).map(|c| Arc::clone(c.value()))
    }

    /// Number of keys with a counter.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no key has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl<K> Default for KeyRegistry<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::LimiterSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn settings() -> Arc<LimiterSettings> {
        Arc::new(LimiterSettings::new(10, 1000).unwrap())
    }

    #[test]
    fn test_get_or_create_reuses_counter() {
        let registry: KeyRegistry<String> = KeyRegistry::new();
        let settings = settings();

        let first = registry.get_or_create("alice", || WindowCounter::new(settings.clone(), 0));
        let second = registry.get_or_create("alice", || WindowCounter::new(settings.clone(), 0));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_does_not_create() {
        let registry: KeyRegistry<String> = KeyRegistry::new();

        assert!(registry.lookup("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_finds_created_counter() {
        let registry: KeyRegistry<String> = KeyRegistry::new();
        let settings = settings();

        let created = registry.get_or_create("bob", || WindowCounter::new(settings.clone(), 0));
        let found = registry.lookup("bob").unwrap();

        assert!(Arc::ptr_eq(&created, &found));
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        const THREADS: usize = 16;

        let registry: KeyRegistry<String> = KeyRegistry::new();
        let settings = settings();
        let created = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let counters: Vec<Arc<WindowCounter>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.get_or_create("shared", || {
                            created.fetch_add(1, Ordering::SeqCst);
                            WindowCounter::new(settings.clone(), 0)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(counters.iter().all(|c| Arc::ptr_eq(c, &counters[0])));
    }
}
