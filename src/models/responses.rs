//! Response DTOs for the control plane API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::{Deserialize, Serialize};

use crate::registry::{Exports, Module, RegistryStats};

/// Response body for POST /modules/lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResponse {
    pub id: String,
    pub loaded: bool,
    pub preloaded: bool,
    pub estimated_size: usize,
    pub exports: Exports,
    /// Modules that directly depend on this one, sorted
    pub dependents: Vec<String>,
}

impl ModuleResponse {
    pub fn new(module: &Module, preloaded: bool, mut dependents: Vec<String>) -> Self {
        dependents.sort();
        Self {
            id: module.id.clone(),
            loaded: module.loaded,
            preloaded,
            estimated_size: module.estimated_size(),
            exports: (*module.exports).clone(),
            dependents,
        }
    }
}

/// Response body for POST /modules/preload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadResponse {
    pub message: String,
    pub id: String,
    pub aliases: usize,
}

impl PreloadResponse {
    pub fn new(id: impl Into<String>, aliases: usize) -> Self {
        let id = id.into();
        Self {
            message: format!("Module '{}' preloaded", id),
            id,
            aliases,
        }
    }
}

/// Response body for POST /modules/invalidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Invalidated module ids, sorted
    pub invalidated: Vec<String>,
    pub count: usize,
}

impl InvalidateResponse {
    pub fn new<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let mut invalidated: Vec<String> = ids.into_iter().collect();
        invalidated.sort();
        Self {
            count: invalidated.len(),
            invalidated,
        }
    }
}

/// Response body for POST /reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    /// Preloaded modules kept across the reset
    pub preserved: usize,
    pub generation: u64,
}

impl ResetResponse {
    pub fn new(preserved: usize, generation: u64) -> Self {
        Self {
            message: "Registry reset".to_string(),
            preserved,
            generation,
        }
    }
}

/// Response body for PUT /config/lru
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub message: String,
    /// Styles evicted by the new limit
    pub evicted_styles: Vec<String>,
    pub stats: StatsResponse,
}

impl ConfigResponse {
    pub fn new(evicted_styles: Vec<String>, stats: RegistryStats) -> Self {
        Self {
            message: "LRU limits updated".to_string(),
            evicted_styles,
            stats: StatsResponse::new(stats),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
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
    /// Module cache hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: RegistryStats) -> Self {
        let total_requests = stats.module_hits + stats.module_misses;
        let hit_rate = if total_requests > 0 {
            stats.module_hits as f64 / total_requests as f64
        } else {
            0.0
        };
        Self {
            modules: stats.modules,
            styles: stats.styles,
            preloaded: stats.preloaded,
            pending: stats.pending,
            resolutions: stats.resolutions,
            dependents: stats.dependents,
            memory_bytes: stats.memory_bytes,
            module_hits: stats.module_hits,
            module_misses: stats.module_misses,
            module_evictions: stats.module_evictions,
            style_evictions: stats.style_evictions,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body produced by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
