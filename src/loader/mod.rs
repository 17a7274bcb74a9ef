//! Loader Module
//!
//! Resolves, fetches and evaluates module dependency closures on top of
//! the shared registry.

mod circular;
mod evaluate;
mod fetch;
mod load;
mod require;
mod semaphore;
mod styles;

pub use circular::WaitGraph;
pub use evaluate::{Evaluator, JsonEvaluator, ModuleRuntime};
pub use fetch::{is_bare_import, FetchResult, ModuleFetcher, StaticFetcher};
pub use load::{LoaderConfig, LoaderConfigUpdate, ModuleLoader};
pub use require::SyncRequire;
pub use semaphore::FetchSemaphore;
pub use styles::{
    clear_injected_styles, inject_styles, remove_styles_for_modules, RecordingStyleInjector,
    StyleInjector,
};
