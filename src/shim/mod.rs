//! Shim Module
//!
//! Resilient loading of component shims: drop-in replacements for
//! framework components that are unavailable in the preview.

mod loader;
mod retry;

pub use loader::{
    load_framework_shims_with_retry, load_generic_shims_with_retry, Framework,
    GenericShimLoadResult, ShimLoadResult, ShimLoader, GENERIC_FALLBACK,
};
pub use retry::{retry_load, RetryOutcome, RetryPolicy};
