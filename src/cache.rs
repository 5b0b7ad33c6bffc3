// Bounded TTL cache for page snapshots.
//
// Entries are stale once older than the TTL and are never served stale.
// Once the cap is exceeded the oldest *inserted* entry goes first; reads do
// not refresh position. Time comes from tokio so tests can pause the clock.

use indexmap::IndexMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

use crate::filters::FilterSet;

// Canonical serialization of (page, filters, page_size)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(page: usize, filters: &FilterSet, page_size: usize) -> Self {
        CacheKey(format!("p={}|s={}|f={}", page, page_size, filters.canonical()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: IndexMap<K, Entry<V>>,
    ttl: Duration,
    capacity: usize,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: IndexMap::new(), ttl, capacity: capacity.max(1) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Stale hits are dropped on the spot
    pub fn get(&mut self, key: &K) -> Option<V> {
        let fresh = self.entries.get(key).map(|e| e.inserted_at.elapsed() < self.ttl)?;
        if fresh {
            self.entries.get(key).map(|e| e.value.clone())
        } else {
            self.entries.shift_remove(key);
            None
        }
    }

    pub fn contains_fresh(&self, key: &K) -> bool {
        self.entries.get(key).is_some_and(|e| e.inserted_at.elapsed() < self.ttl)
    }

    // Re-inserting a key moves it to the back of the eviction order
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.shift_remove(&key);
        self.entries.insert(key, Entry { value, inserted_at: Instant::now() });
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn purge_stale(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        before - self.entries.len()
    }
}
