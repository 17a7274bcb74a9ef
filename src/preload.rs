//! Preload Module
//!
//! Built-in modules registered up front, plus the alias table that maps
//! the specifiers and paths they are known by onto their canonical ids.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModuleError, Result};
use crate::registry::{Exports, ModuleRegistry};

/// A module to preload and the aliases that should resolve to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadEntry {
    pub id: String,
    pub exports: Exports,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl PreloadEntry {
    pub fn new(id: &str, exports: Exports) -> Self {
        Self {
            id: id.to_string(),
            exports,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }
}

// == Preload Table ==
/// Alias -> preloaded id, plus the set of registered ids.
#[derive(Debug, Clone, Default)]
pub struct PreloadTable {
    aliases: HashMap<String, String>,
    ids: BTreeSet<String>,
}

impl PreloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch of entries.
    ///
    /// Fails without changing the table if any alias is already mapped to,
    /// or requested by, a different id.
    pub fn register(&mut self, entries: &[PreloadEntry]) -> Result<()> {
        let mut staged: HashMap<&str, &str> = HashMap::new();
        for entry in entries {
            for alias in &entry.aliases {
                let existing = self
                    .aliases
                    .get(alias)
                    .map(String::as_str)
                    .or_else(|| staged.get(alias.as_str()).copied());
                if let Some(existing) = existing.filter(|existing| *existing != entry.id) {
                    return Err(ModuleError::AliasCollision {
                        alias: alias.clone(),
                        existing: existing.to_string(),
                        incoming: entry.id.clone(),
                    });
                }
                staged.insert(alias, &entry.id);
            }
        }

        for (alias, id) in staged {
            self.aliases.insert(alias.to_string(), id.to_string());
        }
        self.ids
            .extend(entries.iter().map(|entry| entry.id.clone()));
        Ok(())
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Alias map in the form the loader consumes.
    pub fn aliases(&self) -> HashMap<String, String> {
        self.aliases.clone()
    }

    /// Ids that survive a full reset, sorted.
    pub fn preserved_ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
        self.ids.clear();
    }
}

/// Records the entries' aliases and preloads each module into the registry.
pub fn register_preload_entries(
    registry: &mut ModuleRegistry,
    table: &mut PreloadTable,
    entries: Vec<PreloadEntry>,
) -> Result<()> {
    table.register(&entries)?;
    for entry in entries {
        info!(module_id = %entry.id, aliases = entry.aliases.len(), "preloading module");
        registry.preload(&entry.id, entry.exports);
    }
    Ok(())
}
