//! Synchronous Require
//!
//! The `require` handed to the evaluator. Dependencies are fetched and
//! loaded before evaluation, so lookups only ever consult the registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModuleError, Result};
use crate::registry::{Exports, SharedRegistry};

/// `require` bound to one importing module.
///
/// Resolution order: the request as a module id, then the importer's
/// resolution map, then the preload alias map.
#[derive(Clone)]
pub struct SyncRequire {
    registry: SharedRegistry,
    parent_id: String,
    aliases: Arc<HashMap<String, String>>,
}

impl SyncRequire {
    pub fn new(
        registry: SharedRegistry,
        parent_id: &str,
        aliases: Arc<HashMap<String, String>>,
    ) -> Self {
        Self {
            registry,
            parent_id: parent_id.to_string(),
            aliases,
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn require(&self, request: &str) -> Result<Arc<Exports>> {
        let mut registry = self.registry.lock();

        if let Some(module) = registry.get(request) {
            return Ok(Arc::clone(&module.exports));
        }

        if let Some(resolved) = registry.get_resolution(&self.parent_id, request) {
            if let Some(module) = registry.get(&resolved) {
                return Ok(Arc::clone(&module.exports));
            }
        }

        if let Some(alias) = self.aliases.get(request) {
            if let Some(module) = registry.get(alias) {
                return Ok(Arc::clone(&module.exports));
            }
        }

        Err(ModuleError::RequireNotFound {
            request: request.to_string(),
            parent_id: self.parent_id.clone(),
        })
    }
}

impl std::fmt::Debug for SyncRequire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRequire")
            .field("parent_id", &self.parent_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Module, ModuleRegistry};

    fn setup() -> SharedRegistry {
        let mut registry = ModuleRegistry::new();
        registry.set(
            "/docs/util.js",
            Arc::new(Module::new("/docs/util.js", Exports::String("util".into()))),
        );
        registry.preload("npm://react@18", Exports::String("react".into()));
        registry.set_resolution("/docs/page.mdx", "./util.js", "/docs/util.js");
        registry.shared()
    }

    fn aliases() -> Arc<HashMap<String, String>> {
        Arc::new(HashMap::from([(
            "react".to_string(),
            "npm://react@18".to_string(),
        )]))
    }

    #[test]
    fn test_resolution_order() {
        let require = SyncRequire::new(setup(), "/docs/page.mdx", aliases());

        assert_eq!(
            *require.require("/docs/util.js").unwrap(),
            Exports::String("util".into())
        );
        assert_eq!(
            *require.require("./util.js").unwrap(),
            Exports::String("util".into())
        );
        assert_eq!(
            *require.require("react").unwrap(),
            Exports::String("react".into())
        );
    }

    #[test]
    fn test_resolution_is_scoped_to_parent() {
        let require = SyncRequire::new(setup(), "/blog/post.mdx", aliases());

        let err = require.require("./util.js").unwrap_err();
        assert_eq!(
            err,
            ModuleError::RequireNotFound {
                request: "./util.js".to_string(),
                parent_id: "/blog/post.mdx".to_string(),
            }
        );
    }
}
