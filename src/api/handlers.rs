//! API Handlers
//!
//! HTTP request handlers for each control plane endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use parking_lot::Mutex;
use tracing::info;

use crate::error::{ModuleError, Result};
use crate::loader::{
    remove_styles_for_modules, JsonEvaluator, LoaderConfigUpdate, ModuleLoader,
    RecordingStyleInjector, StyleInjector,
};
use crate::models::{
    ConfigResponse, HealthResponse, InvalidateRequest, InvalidateResponse, ModuleIdRequest,
    ModuleResponse, PreloadRequest, PreloadResponse, ResetResponse, StatsResponse,
};
use crate::preload::{register_preload_entries, PreloadTable};
use crate::registry::{LruConfig, ModuleRegistry, SharedRegistry};
use crate::session::PreviewSession;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry shared with every loader of the preview
    pub registry: SharedRegistry,
    /// Aliases registered through the preload endpoint
    pub preloads: Arc<Mutex<PreloadTable>>,
    /// Document side of style injection
    pub styles: Arc<dyn StyleInjector>,
    /// Loader and re-evaluation state of the preview
    pub session: Arc<PreviewSession>,
}

impl AppState {
    /// Serves the registry and styles of `session`'s loader.
    pub fn new(session: PreviewSession) -> Self {
        Self {
            registry: Arc::clone(session.registry()),
            preloads: Arc::new(Mutex::new(PreloadTable::new())),
            styles: Arc::clone(session.loader().styles()),
            session: Arc::new(session),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Modules are evaluated as JSON data and styles are recorded in
    /// memory; there is no document to inject into.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let registry = ModuleRegistry::from_config(config).shared();
        let loader = ModuleLoader::new(
            registry,
            Arc::new(JsonEvaluator),
            Arc::new(RecordingStyleInjector::new()),
            config.loader(),
        );
        Self::new(PreviewSession::new(loader, config.retry_policy()))
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Returns registry statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.registry.lock().stats();
    Json(StatsResponse::new(stats))
}

/// Handler for POST /modules/lookup
///
/// Describes a cached module without touching its recency.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Json(req): Json<ModuleIdRequest>,
) -> Result<Json<ModuleResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ModuleError::InvalidRequest(error_msg));
    }

    let registry = state.registry.lock();
    let module = registry.peek(&req.id).ok_or_else(|| ModuleError::ModuleNotFound {
        request: req.id.clone(),
        parent_id: "control-plane".to_string(),
    })?;
    let dependents = registry
        .get_dependents(&req.id)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();

    Ok(Json(ModuleResponse::new(
        &module,
        registry.is_preloaded(&req.id),
        dependents,
    )))
}

/// Handler for POST /modules/preload
///
/// Registers a preloaded module and its aliases, and hands the full alias
/// table to the loader.
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> Result<Json<PreloadResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ModuleError::InvalidRequest(error_msg));
    }

    let entry = req.into_entry();
    let response = PreloadResponse::new(entry.id.clone(), entry.aliases.len());
    let aliases = {
        let mut registry = state.registry.lock();
        let mut preloads = state.preloads.lock();
        register_preload_entries(&mut registry, &mut preloads, vec![entry])?;
        preloads.aliases()
    };
    state.session.loader().configure(LoaderConfigUpdate {
        preload_aliases: Some(aliases),
        ..LoaderConfigUpdate::default()
    });

    info!(module_id = %response.id, aliases = response.aliases, "module preloaded");
    Ok(Json(response))
}

/// Handler for POST /modules/invalidate
///
/// Drops a module, optionally with its transitive dependents, and removes
/// the stylesheets of everything dropped.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ModuleError::InvalidRequest(error_msg));
    }

    let (invalidated, styled) = {
        let mut registry = state.registry.lock();
        let invalidated: Vec<String> = if req.cascade {
            registry.invalidate_with_dependents(&req.id).into_iter().collect()
        } else {
            registry.invalidate(&req.id);
            vec![req.id.clone()]
        };
        let styled: Vec<String> = invalidated
            .iter()
            .filter(|id| registry.has_injected_style(id))
            .cloned()
            .collect();
        (invalidated, styled)
    };
    remove_styles_for_modules(&state.registry, state.styles.as_ref(), &styled);

    info!(module_id = %req.id, count = invalidated.len(), "modules invalidated");
    Ok(Json(InvalidateResponse::new(invalidated)))
}

/// Handler for POST /reset
///
/// Drops every non-preloaded module and all injected styles.
pub async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    state.session.reset();
    let (preserved, generation) = {
        let registry = state.registry.lock();
        (registry.stats().preloaded, registry.generation())
    };

    info!(preserved, generation, "registry reset");
    Json(ResetResponse::new(preserved, generation))
}

/// Handler for PUT /config/lru
///
/// Applies new cache limits; anything over the new limits is evicted.
pub async fn config_lru_handler(
    State(state): State<AppState>,
    Json(config): Json<LruConfig>,
) -> Json<ConfigResponse> {
    let (evicted_styles, stats) = {
        let mut registry = state.registry.lock();
        let evicted = registry.configure_lru(config);
        (evicted, registry.stats())
    };
    for id in &evicted_styles {
        state.styles.remove_module_css(id);
    }

    info!(
        modules = stats.modules,
        evicted_styles = evicted_styles.len(),
        "LRU limits updated"
    );
    Json(ConfigResponse::new(evicted_styles, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{inject_styles, LoaderConfig};
    use crate::shim::RetryPolicy;
    use crate::registry::{Exports, Module};

    fn test_state() -> (AppState, Arc<RecordingStyleInjector>) {
        let injector = Arc::new(RecordingStyleInjector::new());
        let loader = ModuleLoader::new(
            ModuleRegistry::new().shared(),
            Arc::new(JsonEvaluator),
            injector.clone(),
            LoaderConfig::default(),
        );
        let state = AppState::new(PreviewSession::new(loader, RetryPolicy::default()));
        (state, injector)
    }

    #[tokio::test]
    async fn test_preload_and_lookup_handler() {
        let (state, _) = test_state();

        let req = PreloadRequest {
            id: "npm://react@18".to_string(),
            exports: Exports::object([("version", Exports::String("18".into()))]),
            aliases: vec!["react".to_string()],
        };
        let result = preload_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());
        assert_eq!(state.preloads.lock().resolve("react"), Some("npm://react@18"));

        let req = ModuleIdRequest {
            id: "npm://react@18".to_string(),
        };
        let response = lookup_handler(State(state), Json(req)).await.unwrap();
        assert!(response.preloaded);
        assert!(response.loaded);
    }

    #[tokio::test]
    async fn test_preload_aliases_reach_loader() {
        let (state, _) = test_state();

        let req = PreloadRequest {
            id: "npm://react@18".to_string(),
            exports: Exports::object([("version", Exports::String("18".into()))]),
            aliases: vec!["react".to_string(), "/node_modules/react/index.js".to_string()],
        };
        preload_handler(State(state.clone()), Json(req)).await.unwrap();

        let config = state.session.loader().config();
        assert_eq!(config.preload_aliases.len(), 2);
        assert_eq!(
            config.preload_aliases.get("react").map(String::as_str),
            Some("npm://react@18")
        );
    }

    #[tokio::test]
    async fn test_lookup_missing_module() {
        let (state, _) = test_state();

        let req = ModuleIdRequest {
            id: "/nope.js".to_string(),
        };
        let result = lookup_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(ModuleError::ModuleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_preload_alias_collision() {
        let (state, _) = test_state();

        for id in ["npm://react@18", "npm://react@17"] {
            let req = PreloadRequest {
                id: id.to_string(),
                exports: Exports::empty_object(),
                aliases: vec!["react".to_string()],
            };
            let result = preload_handler(State(state.clone()), Json(req)).await;
            if id.ends_with("17") {
                assert!(matches!(result, Err(ModuleError::AliasCollision { .. })));
            } else {
                assert!(result.is_ok());
            }
        }
    }

    #[tokio::test]
    async fn test_invalidate_cascade_removes_styles() {
        let (state, injector) = test_state();
        {
            let mut registry = state.registry.lock();
            for id in ["A", "B", "C"] {
                registry.set(id, Arc::new(Module::new(id, Exports::empty_object())));
            }
            registry.add_dependency("B", "A");
            registry.add_dependency("C", "B");
        }
        inject_styles(&state.registry, injector.as_ref(), "B", ".b {}");

        let req = InvalidateRequest {
            id: "A".to_string(),
            cascade: true,
        };
        let response = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(response.invalidated, vec!["A", "B", "C"]);
        assert!(!injector.contains("B"));
        assert!(!state.registry.lock().has_injected_style("B"));
        assert!(!state.registry.lock().has("C"));
    }

    #[tokio::test]
    async fn test_invalidate_single_keeps_dependents() {
        let (state, _) = test_state();
        {
            let mut registry = state.registry.lock();
            registry.set("A", Arc::new(Module::new("A", Exports::empty_object())));
            registry.set("B", Arc::new(Module::new("B", Exports::empty_object())));
            registry.add_dependency("B", "A");
        }

        let req = InvalidateRequest {
            id: "A".to_string(),
            cascade: false,
        };
        let response = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(response.count, 1);
        assert!(state.registry.lock().has("B"));
    }

    #[tokio::test]
    async fn test_reset_handler_keeps_preloaded() {
        let (state, injector) = test_state();
        {
            let mut registry = state.registry.lock();
            registry.preload("npm://react@18", Exports::empty_object());
            registry.set("/a.js", Arc::new(Module::new("/a.js", Exports::empty_object())));
        }
        inject_styles(&state.registry, injector.as_ref(), "/a.css", ".a {}");

        let response = reset_handler(State(state.clone())).await;

        assert_eq!(response.preserved, 1);
        assert_eq!(response.generation, 1);
        assert!(injector.ids().is_empty());
        let registry = state.registry.lock();
        assert!(registry.has("npm://react@18"));
        assert!(!registry.has("/a.js"));
    }

    #[tokio::test]
    async fn test_config_lru_evicts_styles() {
        let (state, injector) = test_state();
        for id in ["/a.css", "/b.css", "/c.css"] {
            inject_styles(&state.registry, injector.as_ref(), id, "x {}");
        }
        {
            let mut registry = state.registry.lock();
            registry.decrement_style_ref("/a.css");
            registry.decrement_style_ref("/b.css");
        }

        let config = LruConfig {
            max_styles: Some(0),
            ..LruConfig::default()
        };
        let response = config_lru_handler(State(state), Json(config)).await;

        assert_eq!(response.evicted_styles, vec!["/a.css", "/b.css"]);
        assert_eq!(injector.ids(), vec!["/c.css".to_string()]);
        assert_eq!(response.stats.styles, 1);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.modules, 0);
        assert_eq!(response.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let (state, _) = test_state();

        let req = ModuleIdRequest { id: String::new() };
        let result = lookup_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(ModuleError::InvalidRequest(_))));
    }
}
