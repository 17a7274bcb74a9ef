//! API Routes
//!
//! Configures the Axum router with all control plane endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    config_lru_handler, health_handler, invalidate_handler, lookup_handler, preload_handler,
    reset_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin, the preview runs on another port
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/modules/lookup", post(lookup_handler))
        .route("/modules/preload", post(preload_handler))
        .route("/modules/invalidate", post(invalidate_handler))
        .route("/reset", post(reset_handler))
        .route("/config/lru", put(config_lru_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
