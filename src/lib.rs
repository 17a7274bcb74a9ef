//! Preview Modules - module loading and caching for live document previews
//!
//! Loads dependency closures of compiled documents through a bounded,
//! reference-aware registry, with cycle handling, fetch deduplication and
//! stylesheet injection.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod preload;
pub mod registry;
pub mod session;
pub mod shim;

pub use api::AppState;
pub use config::Config;
pub use error::{ModuleError, Result};
pub use loader::{ModuleFetcher, ModuleLoader};
pub use registry::{ModuleRegistry, SharedRegistry};
pub use session::PreviewSession;
