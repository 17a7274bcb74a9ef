//! Style Cache
//!
//! Reference-counted tracking of which modules have their CSS injected.

use crate::cache::{BoundedCache, CacheLimits, EvictionPolicy, LimitsUpdate};
use crate::config::DEFAULT_MAX_STYLES;

/// Tracking entry for one injected stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleEntry {
    pub ref_count: usize,
}

/// Styles with live references are protected; evicted ids are recorded so
/// callers can remove the stylesheet itself.
#[derive(Debug, Default)]
struct StylePolicy {
    evicted: Vec<String>,
}

impl EvictionPolicy<String, StyleEntry> for StylePolicy {
    fn is_protected(&self, _key: &String, value: &StyleEntry) -> bool {
        value.ref_count > 0
    }

    fn on_evict(&mut self, key: &String, _value: &StyleEntry) {
        self.evicted.push(key.clone());
    }
}

// == Style Cache ==
/// Tracks injected styles so one `<style>` element can be shared by every
/// module importing the same stylesheet.
///
/// A style stays in place while `ref_count > 0`. At zero it becomes an
/// eviction candidate but is kept for reuse until evicted or unmarked.
///
/// Mutating operations return the ids whose tracking was evicted, so the
/// caller can remove the corresponding CSS.
#[derive(Debug)]
pub struct StyleCache {
    cache: BoundedCache<String, StyleEntry, StylePolicy>,
    max_styles: usize,
}

impl StyleCache {
    pub fn new(max_styles: usize) -> Self {
        Self {
            cache: BoundedCache::new(CacheLimits::entries(max_styles), StylePolicy::default()),
            max_styles,
        }
    }

    pub fn configure(&mut self, max_styles: Option<usize>) -> Vec<String> {
        if let Some(max_styles) = max_styles {
            self.max_styles = max_styles;
            self.cache.update_settings(LimitsUpdate {
                max_entries: Some(max_styles),
                max_memory_bytes: None,
            });
        }
        self.take_evicted()
    }

    pub fn has_injected_style(&self, id: &str) -> bool {
        self.cache.has(&id.to_string())
    }

    pub fn ref_count(&self, id: &str) -> Option<usize> {
        self.cache.peek(&id.to_string()).map(|entry| entry.ref_count)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn evictions(&self) -> u64 {
        self.cache.stats().evictions
    }

    // == Mark Injected ==
    /// Records one more reference to a module's stylesheet.
    ///
    /// A new entry first makes room by evicting unreferenced styles, then
    /// starts at a reference count of 1. An existing entry is incremented
    /// and refreshed in LRU order.
    pub fn mark_style_injected(&mut self, id: &str) -> Vec<String> {
        let key = id.to_string();
        if !self.cache.update(&key, |entry| entry.ref_count += 1) {
            self.evict_unreferenced_to_capacity();
            self.cache.set(key, StyleEntry { ref_count: 1 });
        }
        self.take_evicted()
    }

    /// Evicts unreferenced styles, oldest first, until a new entry fits.
    fn evict_unreferenced_to_capacity(&mut self) {
        while self.cache.len() >= self.max_styles {
            if !self.cache.evict_oldest_where(|_, entry| entry.ref_count == 0) {
                break;
            }
        }
    }

    // == Decrement ==
    /// Drops one reference, never going below zero.
    pub fn decrement_style_ref(&mut self, id: &str) -> Vec<String> {
        self.cache.update(&id.to_string(), |entry| {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        });
        self.take_evicted()
    }

    /// Stops tracking a style immediately, whatever its reference count.
    pub fn unmark_style_injected(&mut self, id: &str) -> bool {
        let removed = self.cache.remove(&id.to_string()).is_some();
        // The caller removes the CSS itself; do not report it as evicted.
        self.cache.policy_mut().evicted.retain(|evicted| evicted != id);
        removed
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.cache.policy_mut().evicted.clear();
    }

    fn take_evicted(&mut self) -> Vec<String> {
        std::mem::take(&mut self.cache.policy_mut().evicted)
    }
}

impl Default for StyleCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STYLES)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_counting_protects_until_zero() {
        let mut styles = StyleCache::new(1);
        styles.mark_style_injected("x");
        styles.mark_style_injected("x");
        styles.decrement_style_ref("x");

        assert_eq!(styles.ref_count("x"), Some(1));

        // Still protected: a new style cannot displace it
        let evicted = styles.mark_style_injected("y");
        assert!(evicted.is_empty());
        assert!(styles.has_injected_style("x"));

        styles.decrement_style_ref("x");
        assert_eq!(styles.ref_count("x"), Some(0));
        // Zero references: kept for reuse until something needs the room
        assert!(styles.has_injected_style("x"));

        let evicted = styles.mark_style_injected("z");
        assert_eq!(evicted, vec!["x".to_string()]);
        assert!(!styles.has_injected_style("x"));
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut styles = StyleCache::default();
        styles.mark_style_injected("x");
        styles.decrement_style_ref("x");
        styles.decrement_style_ref("x");

        assert_eq!(styles.ref_count("x"), Some(0));
        assert!(styles.decrement_style_ref("missing").is_empty());
    }

    #[test]
    fn test_evicts_oldest_unreferenced_first() {
        let mut styles = StyleCache::new(2);
        styles.mark_style_injected("a");
        styles.mark_style_injected("b");
        styles.decrement_style_ref("b");
        styles.decrement_style_ref("a");

        // "b" was released before "a" touched again, so "b" is older
        let evicted = styles.mark_style_injected("c");
        assert_eq!(evicted, vec!["b".to_string()]);
        assert!(styles.has_injected_style("a"));
    }

    #[test]
    fn test_unmark_removes_regardless_of_refs() {
        let mut styles = StyleCache::default();
        styles.mark_style_injected("x");
        styles.mark_style_injected("x");

        assert!(styles.unmark_style_injected("x"));
        assert!(!styles.has_injected_style("x"));
        assert!(!styles.unmark_style_injected("x"));

        // The explicit removal is not reported by later operations
        assert!(styles.mark_style_injected("y").is_empty());
    }

    #[test]
    fn test_configure_evicts_unreferenced_overflow() {
        let mut styles = StyleCache::default();
        styles.mark_style_injected("a");
        styles.mark_style_injected("b");
        styles.decrement_style_ref("a");

        let evicted = styles.configure(Some(0));
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(styles.has_injected_style("b"));
        assert_eq!(styles.evictions(), 1);
    }
}
