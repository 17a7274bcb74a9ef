//! Eviction Policy Module
//!
//! Pluggable hooks consulted by [`BoundedCache`](super::BoundedCache) when it
//! inserts, sizes, and evicts entries.

// == Eviction Policy ==
/// Decides which entries are protected, how big they are, and what happens
/// when one is evicted.
///
/// Every method has a neutral default, so a policy only overrides what it needs.
pub trait EvictionPolicy<K, V> {
    /// Protected entries are never evicted and do not count toward limits.
    fn is_protected(&self, _key: &K, _value: &V) -> bool {
        false
    }

    /// Estimated size of a value in bytes. Returning 0 everywhere disables
    /// the memory pass in practice.
    fn estimate_size(&self, _value: &V) -> usize {
        0
    }

    /// Called after an entry is removed by eviction or an explicit removal.
    fn on_evict(&mut self, _key: &K, _value: &V) {}
}

/// Policy with no protection, no sizing and no eviction hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainLru;

impl<K, V> EvictionPolicy<K, V> for PlainLru {}
