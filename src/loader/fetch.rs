//! Fetcher Contract
//!
//! Fetching turns an import specifier into source text plus its declared
//! dependencies. How that happens (filesystem, network, bundler) is up to
//! the host; the loader only needs the [`ModuleFetcher`] contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::bail;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

const NPM_MODULE_PREFIX: &str = "npm://";

/// Source of a resolved module as returned by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Canonical id the specifier resolved to
    pub fs_path: String,
    pub code: String,
    /// Specifiers the module imports, in declaration order
    pub dependencies: Vec<String>,
    /// Present for stylesheets; the module is injected rather than evaluated
    pub css: Option<String>,
}

impl FetchResult {
    pub fn module(
        fs_path: impl Into<String>,
        code: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            fs_path: fs_path.into(),
            code: code.into(),
            dependencies,
            css: None,
        }
    }

    pub fn stylesheet(fs_path: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            fs_path: fs_path.into(),
            code: String::new(),
            dependencies: Vec::new(),
            css: Some(css.into()),
        }
    }
}

/// Resolves and retrieves module sources.
///
/// `Ok(None)` means the specifier could not be found; `Err` means the
/// fetch itself failed.
pub trait ModuleFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        specifier: &'a str,
        is_bare_import: bool,
        parent_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<FetchResult>>>;
}

/// True for package imports such as `react` or `@mdx-js/react`.
pub fn is_bare_import(specifier: &str) -> bool {
    !specifier.starts_with('/')
        && !specifier.starts_with("./")
        && !specifier.starts_with("../")
        && !specifier.starts_with(NPM_MODULE_PREFIX)
}

// == Static Fetcher ==
/// In-memory fetcher over a fixed set of sources.
///
/// Lookups try the `(parent, specifier)` pair first, then the specifier
/// alone. Every call is recorded, which makes it handy for hosts that
/// already hold all sources and for exercising the loader.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    scoped: HashMap<(String, String), FetchResult>,
    global: HashMap<String, FetchResult>,
    failures: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `result` for `specifier` regardless of the importing module.
    pub fn with_module(mut self, specifier: &str, result: FetchResult) -> Self {
        self.global.insert(specifier.to_string(), result);
        self
    }

    /// Serves `result` for `specifier` only when imported from `parent_id`.
    pub fn with_module_from(mut self, parent_id: &str, specifier: &str, result: FetchResult) -> Self {
        self.scoped
            .insert((parent_id.to_string(), specifier.to_string()), result);
        self
    }

    /// Fails every fetch of `specifier` with `message`.
    pub fn with_failure(mut self, specifier: &str, message: &str) -> Self {
        self.failures
            .insert(specifier.to_string(), message.to_string());
        self
    }

    /// Delays every fetch, simulating network latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every `(parent_id, specifier)` fetched so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of fetches observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lookup(&self, specifier: &str, parent_id: &str) -> Option<FetchResult> {
        self.scoped
            .get(&(parent_id.to_string(), specifier.to_string()))
            .or_else(|| self.global.get(specifier))
            .cloned()
    }
}

impl ModuleFetcher for StaticFetcher {
    fn fetch<'a>(
        &'a self,
        specifier: &'a str,
        _is_bare_import: bool,
        parent_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<FetchResult>>> {
        async move {
            self.calls
                .lock()
                .push((parent_id.to_string(), specifier.to_string()));

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(message) = self.failures.get(specifier) {
                bail!("{}", message);
            }
            Ok(self.lookup(specifier, parent_id))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_bare_import() {
        assert!(is_bare_import("react"));
        assert!(is_bare_import("@mdx-js/react"));
        assert!(!is_bare_import("./a.js"));
        assert!(!is_bare_import("../a.js"));
        assert!(!is_bare_import("/abs/a.js"));
        assert!(!is_bare_import("npm://react@18"));
    }

    #[tokio::test]
    async fn test_scoped_lookup_wins() {
        let fetcher = StaticFetcher::new()
            .with_module("./util.js", FetchResult::module("/util.js", "", vec![]))
            .with_module_from(
                "/docs/a.mdx",
                "./util.js",
                FetchResult::module("/docs/util.js", "", vec![]),
            );

        let scoped = fetcher.fetch("./util.js", false, "/docs/a.mdx").await.unwrap();
        let global = fetcher.fetch("./util.js", false, "/b.mdx").await.unwrap();

        assert_eq!(scoped.map(|r| r.fs_path), Some("/docs/util.js".to_string()));
        assert_eq!(global.map(|r| r.fs_path), Some("/util.js".to_string()));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_failing() {
        let fetcher = StaticFetcher::new().with_failure("./broken.js", "connection reset");

        assert_eq!(fetcher.fetch("./nope.js", false, "/a.js").await.unwrap(), None);
        let err = fetcher.fetch("./broken.js", false, "/a.js").await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
