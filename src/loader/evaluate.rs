//! Evaluator Contract

use anyhow::Context;

use crate::loader::SyncRequire;
use crate::registry::Exports;

/// Context passed to the evaluator for one module.
#[derive(Debug, Clone)]
pub struct ModuleRuntime {
    pub module_id: String,
    pub require: SyncRequire,
}

impl ModuleRuntime {
    pub fn new(module_id: &str, require: SyncRequire) -> Self {
        Self {
            module_id: module_id.to_string(),
            require,
        }
    }
}

/// Turns compiled module source into live exports.
///
/// Evaluation is synchronous: every dependency is already in the registry
/// when it runs, and imports go through `runtime.require`.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, code: &str, module_id: &str, runtime: &ModuleRuntime)
        -> anyhow::Result<Exports>;
}

/// Evaluates data modules whose source is the JSON form of their exports.
///
/// Blank sources export an empty object. Imports are not followed; the
/// loader has already placed every declared dependency in the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEvaluator;

impl Evaluator for JsonEvaluator {
    fn evaluate(
        &self,
        code: &str,
        module_id: &str,
        _runtime: &ModuleRuntime,
    ) -> anyhow::Result<Exports> {
        if code.trim().is_empty() {
            return Ok(Exports::empty_object());
        }
        serde_json::from_str(code)
            .with_context(|| format!("module {} is not valid JSON", module_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;

    fn runtime(id: &str) -> ModuleRuntime {
        let registry = ModuleRegistry::new().shared();
        ModuleRuntime::new(id, SyncRequire::new(registry, id, Default::default()))
    }

    #[test]
    fn test_json_evaluator_parses_exports() {
        let code = r#"{"default": {"$function": "() => null"}, "title": "Intro"}"#;
        let exports = JsonEvaluator
            .evaluate(code, "/a.json", &runtime("/a.json"))
            .unwrap();

        assert_eq!(
            exports,
            Exports::object([
                ("default", Exports::function("() => null")),
                ("title", Exports::String("Intro".into())),
            ])
        );
    }

    #[test]
    fn test_json_evaluator_blank_and_invalid() {
        let blank = JsonEvaluator.evaluate("  ", "/a.json", &runtime("/a.json")).unwrap();
        assert_eq!(blank, Exports::empty_object());

        let err = JsonEvaluator
            .evaluate("export default 1", "/b.js", &runtime("/b.js"))
            .unwrap_err();
        assert!(err.to_string().contains("/b.js"));
    }
}
