//! Error types for the module engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Module Error Enum ==
/// Unified error type for module loading, caching and the control plane.
///
/// Errors are `Clone` so that a single in-flight load or fetch can hand the
/// same failure to every task awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// A fetch completed but returned nothing for the specifier
    #[error("Module not found: \"{request}\" (required by \"{parent_id}\")")]
    ModuleNotFound { request: String, parent_id: String },

    /// Reserved for explicit cycle reporting; the loader resolves cycles instead
    #[error("Circular dependency detected for \"{module_id}\"")]
    CircularDependency {
        module_id: String,
        parent_id: Option<String>,
    },

    /// The fetcher itself failed
    #[error("Failed to fetch \"{request}\" (requested by \"{parent_id}\"): {cause}")]
    FetchFailed {
        request: String,
        parent_id: String,
        cause: String,
    },

    /// The evaluator failed on the module's source
    #[error("Failed to evaluate module \"{module_id}\": {cause}")]
    EvaluationFailed { module_id: String, cause: String },

    /// Recursion guard tripped
    #[error("Module load depth exceeded for \"{module_id}\" at depth {depth}")]
    ModuleDepthExceeded { module_id: String, depth: usize },

    /// Synchronous require could not find an already-loaded module
    #[error(
        "Module not found: \"{request}\" (required by \"{parent_id}\"). \
         Make sure all dependencies are fetched before evaluation."
    )]
    RequireNotFound { request: String, parent_id: String },

    /// A preload alias already points at a different module
    #[error("Alias collision for \"{alias}\": {existing} vs {incoming}")]
    AliasCollision {
        alias: String,
        existing: String,
        incoming: String,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ModuleError {
    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            ModuleError::ModuleNotFound { .. } | ModuleError::RequireNotFound { .. } => {
                "MODULE_NOT_FOUND"
            }
            ModuleError::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            ModuleError::FetchFailed { .. } => "FETCH_FAILED",
            ModuleError::EvaluationFailed { .. } => "EVALUATION_FAILED",
            ModuleError::ModuleDepthExceeded { .. } => "MODULE_DEPTH_EXCEEDED",
            ModuleError::AliasCollision { .. } => "ALIAS_COLLISION",
            ModuleError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    pub(crate) fn fetch_failed(request: &str, parent_id: &str, cause: anyhow::Error) -> Self {
        ModuleError::FetchFailed {
            request: request.to_string(),
            parent_id: parent_id.to_string(),
            cause: format!("{:#}", cause),
        }
    }

    pub(crate) fn evaluation_failed(module_id: &str, cause: anyhow::Error) -> Self {
        ModuleError::EvaluationFailed {
            module_id: module_id.to_string(),
            cause: format!("{:#}", cause),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ModuleError {
    fn into_response(self) -> Response {
        let status = match &self {
            ModuleError::ModuleNotFound { .. } | ModuleError::RequireNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ModuleError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ModuleError::AliasCollision { .. } => StatusCode::CONFLICT,
            ModuleError::CircularDependency { .. }
            | ModuleError::ModuleDepthExceeded { .. }
            | ModuleError::EvaluationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ModuleError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the module engine.
pub type Result<T> = std::result::Result<T, ModuleError>;
