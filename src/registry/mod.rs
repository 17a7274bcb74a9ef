//! Registry Module
//!
//! Caches evaluated modules and injected styles, tracks the dependency
//! graph, and exposes all three behind one facade.

mod dependency_tracker;
mod module;
mod module_cache;
#[allow(clippy::module_inception)]
mod registry;
mod style_cache;

pub use dependency_tracker::DependencyTracker;
pub use module::{Exports, Module, PendingModule};
pub use module_cache::ModuleCache;
pub use registry::{LruConfig, ModuleRegistry, RegistryStats, SharedRegistry};
pub use style_cache::{StyleCache, StyleEntry};
