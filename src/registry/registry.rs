//! Module Registry
//!
//! Facade over the module cache, style cache and dependency tracker. Keeps
//! the three consistent: whenever a module leaves the cache, its graph and
//! resolution entries go with it.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, DEFAULT_MAX_MEMORY_BYTES, DEFAULT_MAX_MODULES, DEFAULT_MAX_STYLES};
use crate::registry::{DependencyTracker, Exports, Module, ModuleCache, PendingModule, StyleCache};

/// Registry shared between the loader, shim loader and control plane.
///
/// Every registry operation is synchronous; never hold the lock across an
/// `.await`.
pub type SharedRegistry = Arc<Mutex<ModuleRegistry>>;

// == LRU Config ==
/// Cache limits; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruConfig {
    #[serde(default)]
    pub max_modules: Option<usize>,
    #[serde(default)]
    pub max_memory_bytes: Option<usize>,
    #[serde(default)]
    pub max_styles: Option<usize>,
}

// == Registry Stats ==
/// Point-in-time counters across all three subsystems.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub modules: usize,
    pub styles: usize,
    pub preloaded: usize,
    pub pending: usize,
    pub resolutions: usize,
    pub dependents: usize,
    pub memory_bytes: usize,
    pub module_hits: u64,
    pub module_misses: u64,
    pub module_evictions: u64,
    pub style_evictions: u64,
}

// == Module Registry ==
pub struct ModuleRegistry {
    modules: ModuleCache,
    styles: StyleCache,
    dependencies: DependencyTracker,
    /// Bumped by every full reset so loads started earlier can detect it
    generation: u64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: ModuleCache::new(DEFAULT_MAX_MODULES, DEFAULT_MAX_MEMORY_BYTES),
            styles: StyleCache::new(DEFAULT_MAX_STYLES),
            dependencies: DependencyTracker::new(),
            generation: 0,
        }
    }

    /// Creates a registry with the configured cache limits.
    pub fn from_config(config: &Config) -> Self {
        Self {
            modules: ModuleCache::new(config.max_modules, config.max_memory_bytes),
            styles: StyleCache::new(config.max_styles),
            dependencies: DependencyTracker::new(),
            generation: 0,
        }
    }

    /// Wraps the registry for sharing.
    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    // == Configuration ==
    /// Applies new cache limits and evicts overflow right away.
    ///
    /// Returns the style ids whose tracking was evicted.
    pub fn configure_lru(&mut self, config: LruConfig) -> Vec<String> {
        self.modules
            .configure(config.max_modules, config.max_memory_bytes);
        self.sweep_evicted_modules();
        self.styles.configure(config.max_styles)
    }

    // == Modules ==
    /// Registers a built-in module that is never evicted.
    pub fn preload(&mut self, id: &str, exports: Exports) {
        self.modules.preload(id, exports);
        self.sweep_evicted_modules();
    }

    /// Returns a cached module and marks it most recently used.
    pub fn get(&mut self, id: &str) -> Option<Arc<Module>> {
        self.modules.get(id)
    }

    /// Returns a cached module without touching LRU order.
    pub fn peek(&self, id: &str) -> Option<Arc<Module>> {
        self.modules.peek(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.modules.has(id)
    }

    pub fn is_preloaded(&self, id: &str) -> bool {
        self.modules.is_preloaded(id)
    }

    pub fn set(&mut self, id: &str, module: Arc<Module>) {
        self.modules.set(id, module);
        self.sweep_evicted_modules();
    }

    // == Pending Loads ==
    pub fn get_pending(&self, id: &str) -> Option<PendingModule> {
        self.modules.get_pending(id)
    }

    pub fn set_pending(&mut self, id: &str, load: PendingModule) -> u64 {
        self.modules.set_pending(id, load)
    }

    pub fn clear_pending(&mut self, id: &str) {
        self.modules.clear_pending(id);
    }

    pub fn clear_pending_if(&mut self, id: &str, token: u64) {
        self.modules.clear_pending_if(id, token);
    }

    // == Invalidation ==
    /// Drops one module and all metadata that mentions it.
    pub fn invalidate(&mut self, id: &str) {
        self.modules.delete(id);
        self.sweep_evicted_modules();
        self.dependencies.clean_dependents_for(id);
        self.dependencies.clean_resolutions_for(id);
        self.modules.clear_pending(id);
    }

    /// Drops a module and everything that transitively depends on it.
    pub fn invalidate_with_dependents(&mut self, id: &str) -> HashSet<String> {
        let invalidated = self.dependencies.invalidate_with_dependents(id);
        for module_id in &invalidated {
            self.modules.delete(module_id);
            self.modules.clear_pending(module_id);
        }
        self.sweep_evicted_modules();
        invalidated
    }

    // == Dependencies ==
    pub fn add_dependency(&mut self, module_id: &str, depends_on_id: &str) {
        self.dependencies.add_dependency(module_id, depends_on_id);
    }

    pub fn get_dependents(&self, module_id: &str) -> Option<&HashSet<String>> {
        self.dependencies.get_dependents(module_id)
    }

    pub fn clear_dependencies(&mut self) {
        self.dependencies.clear_dependencies();
    }

    // == Resolutions ==
    pub fn set_resolution(&mut self, parent_id: &str, request: &str, fs_path: &str) {
        self.dependencies.set_resolution(parent_id, request, fs_path);
    }

    pub fn get_resolution(&self, parent_id: &str, request: &str) -> Option<String> {
        self.dependencies
            .get_resolution(parent_id, request)
            .map(str::to_string)
    }

    pub fn clear_resolutions(&mut self) {
        self.dependencies.clear_resolutions();
    }

    // == Styles ==
    pub fn has_injected_style(&self, id: &str) -> bool {
        self.styles.has_injected_style(id)
    }

    pub fn style_ref_count(&self, id: &str) -> Option<usize> {
        self.styles.ref_count(id)
    }

    /// Adds a style reference; returns style ids evicted to make room.
    pub fn mark_style_injected(&mut self, id: &str) -> Vec<String> {
        self.styles.mark_style_injected(id)
    }

    pub fn decrement_style_ref(&mut self, id: &str) -> Vec<String> {
        self.styles.decrement_style_ref(id)
    }

    pub fn unmark_style_injected(&mut self, id: &str) -> bool {
        self.styles.unmark_style_injected(id)
    }

    pub fn clear_injected_styles(&mut self) {
        self.styles.clear();
    }

    // == Bulk ==
    /// Full document reset: drops every non-preloaded module, all pending
    /// loads and all graph metadata. Loads still in flight will not store
    /// their results.
    pub fn clear_non_preloaded(&mut self) {
        self.modules.clear_non_preloaded();
        self.modules.take_evicted();
        self.dependencies.clear();
        self.generation += 1;
    }

    /// Drops everything, preloaded modules and styles included.
    pub fn clear(&mut self) {
        self.modules.clear();
        self.styles.clear();
        self.dependencies.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Stats ==
    pub fn stats(&self) -> RegistryStats {
        let module_stats = self.modules.stats();
        RegistryStats {
            modules: self.modules.len(),
            styles: self.styles.len(),
            preloaded: self.modules.preloaded_count(),
            pending: self.modules.pending_count(),
            resolutions: self.dependencies.resolutions_count(),
            dependents: self.dependencies.dependents_count(),
            memory_bytes: self.modules.memory_bytes(),
            module_hits: module_stats.hits,
            module_misses: module_stats.misses,
            module_evictions: module_stats.evictions,
            style_evictions: self.styles.evictions(),
        }
    }

    /// Cleans graph and resolution metadata for modules that left the cache.
    fn sweep_evicted_modules(&mut self) {
        for id in self.modules.take_evicted() {
            debug!(module_id = %id, "cleaning metadata for removed module");
            self.dependencies.clean_dependents_for(&id);
            self.dependencies.clean_resolutions_for(&id);
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
