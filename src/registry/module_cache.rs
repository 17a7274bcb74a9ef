//! Module Cache
//!
//! LRU cache of evaluated modules with memory-aware eviction, pending-load
//! tracking, and eviction immunity for preloaded modules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{BoundedCache, CacheLimits, CacheStats, EvictionPolicy, LimitsUpdate};
use crate::config::{DEFAULT_MAX_MEMORY_BYTES, DEFAULT_MAX_MODULES};
use crate::registry::{Exports, Module, PendingModule};

/// Protects preloaded ids, sizes modules by their exports, and records
/// evicted ids so the registry can clean up dependency metadata.
#[derive(Debug, Default)]
struct ModulePolicy {
    preloaded: HashSet<String>,
    evicted: Vec<String>,
}

impl EvictionPolicy<String, Arc<Module>> for ModulePolicy {
    fn is_protected(&self, key: &String, _value: &Arc<Module>) -> bool {
        self.preloaded.contains(key)
    }

    fn estimate_size(&self, value: &Arc<Module>) -> usize {
        value.estimated_size()
    }

    fn on_evict(&mut self, key: &String, _value: &Arc<Module>) {
        self.evicted.push(key.clone());
    }
}

struct PendingEntry {
    token: u64,
    load: PendingModule,
}

// == Module Cache ==
/// Cache of evaluated modules keyed by canonical id.
///
/// Preloaded modules never count toward the entry or memory limits and are
/// immune to eviction, `delete` and `clear_non_preloaded`.
pub struct ModuleCache {
    cache: BoundedCache<String, Arc<Module>, ModulePolicy>,
    pending: HashMap<String, PendingEntry>,
    next_token: u64,
}

impl ModuleCache {
    pub fn new(max_modules: usize, max_memory_bytes: usize) -> Self {
        Self {
            cache: BoundedCache::new(
                CacheLimits {
                    max_entries: max_modules,
                    max_memory_bytes: Some(max_memory_bytes),
                },
                ModulePolicy::default(),
            ),
            pending: HashMap::new(),
            next_token: 0,
        }
    }

    /// Updates the count and memory limits; `None` keeps the current value.
    pub fn configure(&mut self, max_modules: Option<usize>, max_memory_bytes: Option<usize>) {
        self.cache.update_settings(LimitsUpdate {
            max_entries: max_modules,
            max_memory_bytes,
        });
    }

    pub fn memory_bytes(&self) -> usize {
        self.cache.memory_bytes()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn preloaded_count(&self) -> usize {
        self.cache.policy().preloaded.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // == Preload ==
    /// Stores a built-in module and protects it from eviction.
    pub fn preload(&mut self, id: &str, exports: Exports) {
        self.cache.policy_mut().preloaded.insert(id.to_string());
        self.cache
            .set(id.to_string(), Arc::new(Module::new(id, exports)));
    }

    /// Returns the module and marks it most recently used.
    pub fn get(&mut self, id: &str) -> Option<Arc<Module>> {
        self.cache.get(&id.to_string()).cloned()
    }

    /// Returns the module without touching LRU order or stats.
    pub fn peek(&self, id: &str) -> Option<Arc<Module>> {
        self.cache.peek(&id.to_string()).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.cache.has(&id.to_string())
    }

    pub fn is_preloaded(&self, id: &str) -> bool {
        self.cache.policy().preloaded.contains(id)
    }

    /// Stores a module, evicting overflow.
    pub fn set(&mut self, id: &str, module: Arc<Module>) {
        self.cache.set(id.to_string(), module);
    }

    // == Delete ==
    /// Removes a non-preloaded module, returning the estimated bytes freed.
    pub fn delete(&mut self, id: &str) -> usize {
        if self.is_preloaded(id) {
            return 0;
        }
        let key = id.to_string();
        let freed = self.cache.peek_size(&key).unwrap_or(0);
        self.cache.remove(&key);
        freed
    }

    /// Ids removed by eviction or deletion since the last call.
    pub fn take_evicted(&mut self) -> Vec<String> {
        std::mem::take(&mut self.cache.policy_mut().evicted)
    }

    // == Pending Loads ==
    pub fn get_pending(&self, id: &str) -> Option<PendingModule> {
        self.pending.get(id).map(|entry| entry.load.clone())
    }

    /// Registers an in-progress load, returning a token that identifies
    /// this registration for [`clear_pending_if`](Self::clear_pending_if).
    pub fn set_pending(&mut self, id: &str, load: PendingModule) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.pending
            .insert(id.to_string(), PendingEntry { token, load });
        token
    }

    pub fn clear_pending(&mut self, id: &str) {
        self.pending.remove(id);
    }

    /// Clears the pending registration only if it is still the one
    /// identified by `token`.
    pub fn clear_pending_if(&mut self, id: &str, token: u64) {
        if self.pending.get(id).is_some_and(|entry| entry.token == token) {
            self.pending.remove(id);
        }
    }

    pub fn clear_all_pending(&mut self) {
        self.pending.clear();
    }

    // == Bulk ==
    /// Removes every non-preloaded module and all pending loads.
    pub fn clear_non_preloaded(&mut self) {
        for id in self.cache.keys() {
            if !self.is_preloaded(&id) {
                self.cache.remove(&id);
            }
        }
        self.pending.clear();
    }

    /// Removes everything, preloaded modules included.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending.clear();
        let policy = self.cache.policy_mut();
        policy.preloaded.clear();
        policy.evicted.clear();
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MODULES, DEFAULT_MAX_MEMORY_BYTES)
    }
}
