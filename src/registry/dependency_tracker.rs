//! Dependency Tracker
//!
//! Directed dependency graph plus the per-parent import resolution map,
//! with reverse indexes so cleanup for one module touches only the entries
//! that mention it.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

/// `(parent_id, requested_specifier)`
type ResolutionKey = (String, String);

// == Dependency Tracker ==
#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// (parent, request) -> resolved module id
    resolutions: HashMap<ResolutionKey, String>,
    /// parent id -> resolution keys it owns
    parent_index: HashMap<String, HashSet<ResolutionKey>>,
    /// target id -> resolution keys resolving to it
    target_index: HashMap<String, HashSet<ResolutionKey>>,
    /// dependency -> modules that depend on it
    dependents: HashMap<String, HashSet<String>>,
    /// module -> modules it depends on (inverse of `dependents`)
    dependencies: HashMap<String, HashSet<String>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Resolutions ==
    /// Records that `request` imported from `parent_id` resolves to `fs_path`.
    pub fn set_resolution(&mut self, parent_id: &str, request: &str, fs_path: &str) {
        let key = (parent_id.to_string(), request.to_string());

        if let Some(previous) = self.resolutions.insert(key.clone(), fs_path.to_string()) {
            remove_from_index(&mut self.target_index, &previous, &key);
        }

        self.parent_index
            .entry(parent_id.to_string())
            .or_default()
            .insert(key.clone());
        self.target_index
            .entry(fs_path.to_string())
            .or_default()
            .insert(key);
    }

    pub fn get_resolution(&self, parent_id: &str, request: &str) -> Option<&str> {
        self.resolutions
            .get(&(parent_id.to_string(), request.to_string()))
            .map(String::as_str)
    }

    pub fn resolutions_count(&self) -> usize {
        self.resolutions.len()
    }

    /// Removes every resolution where `module_id` is the parent or the target.
    pub fn clean_resolutions_for(&mut self, module_id: &str) {
        if let Some(keys) = self.parent_index.remove(module_id) {
            for key in keys {
                if let Some(target) = self.resolutions.remove(&key) {
                    remove_from_index(&mut self.target_index, &target, &key);
                }
            }
        }

        if let Some(keys) = self.target_index.remove(module_id) {
            for key in keys {
                self.resolutions.remove(&key);
                remove_from_index(&mut self.parent_index, &key.0, &key);
            }
        }
    }

    pub fn clear_resolutions(&mut self) {
        self.resolutions.clear();
        self.parent_index.clear();
        self.target_index.clear();
    }

    // == Dependency Graph ==
    /// Records that `module_id` depends on `depends_on_id`.
    pub fn add_dependency(&mut self, module_id: &str, depends_on_id: &str) {
        self.dependents
            .entry(depends_on_id.to_string())
            .or_default()
            .insert(module_id.to_string());
        self.dependencies
            .entry(module_id.to_string())
            .or_default()
            .insert(depends_on_id.to_string());
    }

    /// Modules that directly depend on `module_id`.
    pub fn get_dependents(&self, module_id: &str) -> Option<&HashSet<String>> {
        self.dependents.get(module_id)
    }

    /// Number of modules that have at least one dependent.
    pub fn dependents_count(&self) -> usize {
        self.dependents.len()
    }

    /// Removes `module_id` from the graph in both directions.
    pub fn clean_dependents_for(&mut self, module_id: &str) {
        if let Some(dependents) = self.dependents.remove(module_id) {
            for dependent in dependents {
                remove_from_index(&mut self.dependencies, &dependent, module_id);
            }
        }

        if let Some(dependencies) = self.dependencies.remove(module_id) {
            for dependency in dependencies {
                remove_from_index(&mut self.dependents, &dependency, module_id);
            }
        }
    }

    pub fn clear_dependencies(&mut self) {
        self.dependents.clear();
        self.dependencies.clear();
    }

    // == Invalidation ==
    /// Collects `module_id` and everything that transitively depends on it,
    /// then purges graph and resolution entries for the whole set.
    ///
    /// Collection finishes before any cleanup so the graph is never mutated
    /// mid-traversal. Cycles and diamonds are handled by the visited set.
    pub fn invalidate_with_dependents(&mut self, module_id: &str) -> HashSet<String> {
        let mut invalidated = HashSet::new();
        let mut queue = VecDeque::from([module_id.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !invalidated.insert(current.clone()) {
                continue;
            }
            if let Some(dependents) = self.dependents.get(&current) {
                queue.extend(
                    dependents
                        .iter()
                        .filter(|dependent| !invalidated.contains(*dependent))
                        .cloned(),
                );
            }
        }

        for id in &invalidated {
            self.clean_dependents_for(id);
            self.clean_resolutions_for(id);
        }

        debug!(
            module_id,
            count = invalidated.len(),
            "invalidated module with dependents"
        );
        invalidated
    }

    pub fn clear(&mut self) {
        self.clear_resolutions();
        self.clear_dependencies();
    }
}

/// Removes `item` from `index[id]`, dropping the set once empty.
fn remove_from_index<T, Q>(index: &mut HashMap<String, HashSet<T>>, id: &str, item: &Q)
where
    T: std::hash::Hash + Eq + std::borrow::Borrow<Q>,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(set) = index.get_mut(id) {
        set.remove(item);
        if set.is_empty() {
            index.remove(id);
        }
    }
}
