//! Bounded Cache Module
//!
//! Generic cache engine combining HashMap storage with LRU tracking and
//! count- plus memory-based eviction.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, EvictionPolicy, LruTracker, PlainLru};

// == Limits ==
/// Limits applied to the unprotected entries of a [`BoundedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Maximum number of unprotected entries
    pub max_entries: usize,
    /// Memory budget for unprotected entries; `None` or `Some(0)` disables the memory pass
    pub max_memory_bytes: Option<usize>,
}

impl CacheLimits {
    pub fn entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            max_memory_bytes: None,
        }
    }
}

/// Partial limit update; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitsUpdate {
    pub max_entries: Option<usize>,
    pub max_memory_bytes: Option<usize>,
}

// == Bounded Cache ==
/// LRU cache bounded by entry count and estimated memory.
///
/// Overflow is resolved in two passes after every insert and every limit
/// change: first by count, then by memory. Each pass evicts the least
/// recently used entry the policy does not protect. When only protected
/// entries remain the pass stops, even if the limit is still exceeded.
#[derive(Debug)]
pub struct BoundedCache<K, V, P = PlainLru> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    limits: CacheLimits,
    /// Sum of all entry sizes, protected ones included
    memory_bytes: usize,
    policy: P,
}

impl<K, V, P> BoundedCache<K, V, P>
where
    K: Clone + Eq + Hash + Debug,
    P: EvictionPolicy<K, V>,
{
    // == Constructor ==
    pub fn new(limits: CacheLimits, policy: P) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            limits,
            memory_bytes: 0,
            policy,
        }
    }

    // == Get ==
    /// Returns the value and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.stats.record_hit();
            self.lru.touch(key);
            self.entries.get(key).map(|entry| &entry.value)
        } else {
            self.stats.record_miss();
            None
        }
    }

    // == Peek ==
    /// Reads a value without promoting it.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Estimated size of an entry, without promoting it.
    pub fn peek_size(&self, key: &K) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.size)
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    // == Set ==
    /// Inserts or replaces a value, then evicts overflow.
    ///
    /// Replacing an entry does not invoke the eviction hook.
    pub fn set(&mut self, key: K, value: V) {
        let size = self.policy.estimate_size(&value);
        if let Some(previous) = self.entries.insert(key.clone(), CacheEntry::new(value, size)) {
            self.memory_bytes -= previous.size;
        }
        self.memory_bytes += size;
        self.lru.touch(&key);

        self.evict_overflow();
    }

    // == Update ==
    /// Mutates an existing value in place, promotes it, and re-evaluates
    /// overflow (the mutation may change protection or size).
    ///
    /// Returns false if the key is absent.
    pub fn update<F>(&mut self, key: &K, mutate: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        mutate(&mut entry.value);
        let size = self.policy.estimate_size(&entry.value);
        self.memory_bytes = self.memory_bytes - entry.size + size;
        entry.size = size;
        self.lru.touch(key);

        self.evict_overflow();
        true
    }

    // == Remove ==
    /// Removes a specific entry and invokes the eviction hook.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.memory_bytes -= entry.size;
        self.policy.on_evict(key, &entry.value);
        Some(entry.into_value())
    }

    // == Clear ==
    /// Drops every entry without invoking the eviction hook.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.memory_bytes = 0;
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        self.lru.iter_oldest_first().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated footprint of all entries, protected ones included.
    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.memory_bytes = self.memory_bytes;
        stats
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable policy access. Callers that change protection state should
    /// follow up with [`update_settings`](Self::update_settings) or another
    /// mutation so overflow is re-evaluated.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    // == Update Settings ==
    /// Applies new limits and immediately re-evaluates overflow.
    pub fn update_settings(&mut self, update: LimitsUpdate) {
        if let Some(max_entries) = update.max_entries {
            self.limits.max_entries = max_entries;
        }
        if let Some(max_memory_bytes) = update.max_memory_bytes {
            self.limits.max_memory_bytes = Some(max_memory_bytes);
        }

        self.evict_overflow();
    }

    // == Evict Oldest Matching ==
    /// Evicts the least recently used entry matching `predicate`.
    ///
    /// Returns false when nothing matches.
    pub fn evict_oldest_where<F>(&mut self, predicate: F) -> bool
    where
        F: Fn(&K, &V) -> bool,
    {
        let victim = self
            .lru
            .iter_oldest_first()
            .find(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| predicate(key, &entry.value))
            })
            .cloned();

        match victim {
            Some(key) => {
                self.evict(&key);
                true
            }
            None => false,
        }
    }

    // == Overflow ==
    fn evict_overflow(&mut self) {
        let mut evictable = self.count_evictable();
        while evictable > self.limits.max_entries {
            if self.evict_oldest_evictable().is_none() {
                break;
            }
            evictable -= 1;
        }

        let Some(max_memory) = self.limits.max_memory_bytes.filter(|max| *max > 0) else {
            return;
        };
        let mut memory = self.evictable_memory();
        while memory > max_memory && evictable > 0 {
            match self.evict_oldest_evictable() {
                Some(freed) => {
                    memory -= freed;
                    evictable -= 1;
                }
                None => break,
            }
        }
    }

    fn is_evictable(&self, key: &K, entry: &CacheEntry<V>) -> bool {
        !self.policy.is_protected(key, &entry.value)
    }

    fn count_evictable(&self) -> usize {
        self.entries
            .iter()
            .filter(|(key, entry)| self.is_evictable(key, entry))
            .count()
    }

    fn evictable_memory(&self) -> usize {
        self.entries
            .iter()
            .filter(|(key, entry)| self.is_evictable(key, entry))
            .map(|(_, entry)| entry.size)
            .sum()
    }

    /// Evicts the oldest unprotected entry, returning its size.
    fn evict_oldest_evictable(&mut self) -> Option<usize> {
        let victim = self
            .lru
            .iter_oldest_first()
            .find(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| self.is_evictable(key, entry))
            })
            .cloned()?;

        self.evict(&victim)
    }

    fn evict(&mut self, key: &K) -> Option<usize> {
        let size = self.peek_size(key)?;
        self.remove(key)?;
        self.stats.record_eviction();
        debug!(?key, size, "evicted cache entry");
        Some(size)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    /// Protects keys starting with `!` and sizes values by their length.
    #[derive(Default)]
    struct TestPolicy {
        evicted: Vec<String>,
    }

    impl EvictionPolicy<String, String> for TestPolicy {
        fn is_protected(&self, key: &String, _value: &String) -> bool {
            key.starts_with('!')
        }

        fn estimate_size(&self, value: &String) -> usize {
            value.len()
        }

        fn on_evict(&mut self, key: &String, _value: &String) {
            self.evicted.push(key.clone());
        }
    }

    fn cache(max_entries: usize, max_memory: Option<usize>) -> BoundedCache<String, String, TestPolicy> {
        BoundedCache::new(
            CacheLimits {
                max_entries,
                max_memory_bytes: max_memory,
            },
            TestPolicy::default(),
        )
    }

    fn set(cache: &mut BoundedCache<String, String, TestPolicy>, key: &str, value: &str) {
        cache.set(key.to_string(), value.to_string());
    }

    #[test]
    fn test_count_eviction_is_lru() {
        let mut cache = cache(3, None);
        set(&mut cache, "key1", "a");
        set(&mut cache, "key2", "b");
        set(&mut cache, "key3", "c");

        // Access key1 so key2 becomes the oldest
        assert!(cache.get(&"key1".to_string()).is_some());
        set(&mut cache, "key4", "d");

        assert_eq!(cache.len(), 3);
        assert!(!cache.has(&"key2".to_string()));
        assert_eq!(cache.policy().evicted, vec!["key2".to_string()]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = cache(2, None);
        set(&mut cache, "key1", "a");
        set(&mut cache, "key2", "b");

        assert_eq!(cache.peek(&"key1".to_string()), Some(&"a".to_string()));
        set(&mut cache, "key3", "c");

        assert!(!cache.has(&"key1".to_string()));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_protected_entries_do_not_count_and_survive() {
        let mut cache = cache(1, None);
        set(&mut cache, "!pinned", "p");
        set(&mut cache, "a", "1");
        set(&mut cache, "b", "2");

        assert!(cache.has(&"!pinned".to_string()));
        assert!(cache.has(&"b".to_string()));
        assert!(!cache.has(&"a".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_only_protected_entries_stops_eviction() {
        let mut cache = cache(0, None);
        set(&mut cache, "!a", "1");
        set(&mut cache, "!b", "2");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_memory_eviction() {
        let mut cache = cache(100, Some(10));
        set(&mut cache, "a", "xxxx");
        set(&mut cache, "b", "xxxx");
        assert_eq!(cache.memory_bytes(), 8);

        set(&mut cache, "c", "xxxx");
        assert!(!cache.has(&"a".to_string()));
        assert_eq!(cache.memory_bytes(), 8);
    }

    #[test]
    fn test_memory_budget_ignores_protected_entries() {
        let mut cache = cache(100, Some(4));
        set(&mut cache, "!big", "xxxxxxxxxxxx");
        set(&mut cache, "a", "xxxx");

        assert!(cache.has(&"!big".to_string()));
        assert!(cache.has(&"a".to_string()));
        assert_eq!(cache.memory_bytes(), 16);
    }

    #[test]
    fn test_replace_adjusts_memory_without_hook() {
        let mut cache = cache(10, None);
        set(&mut cache, "a", "xxxx");
        set(&mut cache, "a", "xx");

        assert_eq!(cache.memory_bytes(), 2);
        assert!(cache.policy().evicted.is_empty());
    }

    #[test]
    fn test_remove_invokes_hook() {
        let mut cache = cache(10, None);
        set(&mut cache, "a", "xxxx");

        assert_eq!(cache.remove(&"a".to_string()), Some("xxxx".to_string()));
        assert_eq!(cache.remove(&"a".to_string()), None);
        assert_eq!(cache.memory_bytes(), 0);
        assert_eq!(cache.policy().evicted, vec!["a".to_string()]);
        // Explicit removal is not an overflow eviction
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_update_settings_evicts_immediately() {
        let mut cache = cache(10, None);
        for key in ["a", "b", "c", "d"] {
            set(&mut cache, key, "1");
        }

        cache.update_settings(LimitsUpdate {
            max_entries: Some(2),
            max_memory_bytes: None,
        });

        assert_eq!(cache.keys(), vec!["c".to_string(), "d".to_string()]);
        assert_eq!(cache.limits().max_entries, 2);
    }

    #[test]
    fn test_update_mutates_and_resizes() {
        let mut cache = cache(10, None);
        set(&mut cache, "a", "x");

        assert!(cache.update(&"a".to_string(), |value| value.push_str("yyy")));
        assert_eq!(cache.peek(&"a".to_string()), Some(&"xyyy".to_string()));
        assert_eq!(cache.memory_bytes(), 4);
        assert!(!cache.update(&"missing".to_string(), |_| {}));
    }

    #[test]
    fn test_evict_oldest_where() {
        let mut cache = cache(10, None);
        set(&mut cache, "a", "keep");
        set(&mut cache, "b", "drop");
        set(&mut cache, "c", "drop");

        assert!(cache.evict_oldest_where(|_, value| value == "drop"));
        assert_eq!(cache.keys(), vec!["a".to_string(), "c".to_string()]);
        assert!(!cache.evict_oldest_where(|_, value| value == "none"));
    }

    #[test]
    fn test_clear_skips_hook() {
        let mut cache = cache(10, None);
        set(&mut cache, "a", "1");
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.memory_bytes(), 0);
        assert!(cache.policy().evicted.is_empty());
    }
}
