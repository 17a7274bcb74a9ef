//! Request DTOs for the control plane API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::preload::PreloadEntry;
use crate::registry::Exports;

/// Longest module id accepted over HTTP.
pub const MAX_MODULE_ID_LENGTH: usize = 1024;

fn validate_id(id: &str) -> Option<String> {
    if id.is_empty() {
        return Some("Module id cannot be empty".to_string());
    }
    if id.len() > MAX_MODULE_ID_LENGTH {
        return Some(format!(
            "Module id exceeds maximum length of {} characters",
            MAX_MODULE_ID_LENGTH
        ));
    }
    None
}

/// Request body for POST /modules/lookup
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleIdRequest {
    pub id: String,
}

impl ModuleIdRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_id(&self.id)
    }
}

/// Request body for POST /modules/preload
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadRequest {
    pub id: String,
    pub exports: Exports,
    /// Specifiers and paths that should resolve to this module
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl PreloadRequest {
    pub fn validate(&self) -> Option<String> {
        if let Some(message) = validate_id(&self.id) {
            return Some(message);
        }
        if self.aliases.iter().any(String::is_empty) {
            return Some("Aliases cannot be empty".to_string());
        }
        None
    }

    pub fn into_entry(self) -> PreloadEntry {
        PreloadEntry {
            id: self.id,
            exports: self.exports,
            aliases: self.aliases,
        }
    }
}

/// Request body for POST /modules/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub id: String,
    /// Also invalidate everything that transitively depends on `id`
    #[serde(default)]
    pub cascade: bool,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        validate_id(&self.id)
    }
}
