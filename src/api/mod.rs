//! API Module
//!
//! HTTP handlers and routing for the module registry control plane.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Registry statistics
//! - `POST /modules/lookup` - Describe a cached module
//! - `POST /modules/preload` - Register a preloaded module and its aliases
//! - `POST /modules/invalidate` - Drop a module, optionally with its dependents
//! - `POST /reset` - Drop all non-preloaded modules and injected styles
//! - `PUT /config/lru` - Change cache limits

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
