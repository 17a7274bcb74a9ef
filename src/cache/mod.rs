//! Cache Module
//!
//! Provides a generic in-memory LRU cache bounded by entry count and
//! estimated memory, with pluggable eviction protection.

mod bounded;
mod entry;
mod lru;
mod policy;
mod stats;


// Re-export public types
pub use bounded::{BoundedCache, CacheLimits, LimitsUpdate};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use policy::{EvictionPolicy, PlainLru};
pub use stats::CacheStats;
