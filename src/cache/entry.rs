//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with a size estimate.

// == Cache Entry ==
/// Pairs a stored value with its estimated size in bytes.
///
/// The size drives memory-bounded eviction; it is computed once on insert
/// by the cache's policy and never recomputed for the lifetime of the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Estimated footprint in bytes (0 when the cache does not track memory)
    pub size: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    pub fn new(value: V, size: usize) -> Self {
        Self { value, size }
    }

    /// Consumes the entry and returns the stored value.
    pub fn into_value(self) -> V {
        self.value
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("value".to_string(), 42);

        assert_eq!(entry.value, "value");
        assert_eq!(entry.size, 42);
    }

    #[test]
    fn test_entry_into_value() {
        let entry = CacheEntry::new(vec![1, 2, 3], 0);
        assert_eq!(entry.into_value(), vec![1, 2, 3]);
    }
}
