//! Preview Session
//!
//! Drives re-evaluation of one previewed document. A change of entry path
//! resets every non-preloaded module; re-evaluating the same entry only
//! drops the entry and its dependents, so unrelated dependencies stay
//! cached between keystrokes. Shim loads started before an evaluation are
//! awaited before it loads anything.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::loader::{clear_injected_styles, ModuleFetcher, ModuleLoader};
use crate::registry::{Module, ModuleRegistry, SharedRegistry};
use crate::shim::{
    load_framework_shims_with_retry, load_generic_shims_with_retry, Framework, RetryPolicy,
    ShimLoader,
};

pub struct PreviewSession {
    loader: ModuleLoader,
    shim_policy: RetryPolicy,
    last_entry: Mutex<Option<String>>,
    pending_shims: Mutex<Vec<JoinHandle<()>>>,
}

impl PreviewSession {
    pub fn new(loader: ModuleLoader, shim_policy: RetryPolicy) -> Self {
        Self {
            loader,
            shim_policy,
            last_entry: Mutex::new(None),
            pending_shims: Mutex::new(Vec::new()),
        }
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.loader.registry()
    }

    /// Entry path of the most recent evaluation.
    pub fn last_entry(&self) -> Option<String> {
        self.last_entry.lock().clone()
    }

    // == Shims ==
    /// Starts loading a framework's shims in the background. The next
    /// evaluation waits for it to finish.
    pub fn load_framework_shims<F, Fut, G>(
        &self,
        framework: Framework,
        framework_loader: F,
        generic_fallback: G,
    ) where
        F: FnMut(SharedRegistry) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        G: FnOnce(&mut ModuleRegistry) -> anyhow::Result<()> + Send + 'static,
    {
        let registry = Arc::clone(self.registry());
        let policy = self.shim_policy;
        let handle = tokio::spawn(async move {
            let result = load_framework_shims_with_retry(
                &registry,
                framework,
                &policy,
                framework_loader,
                generic_fallback,
            )
            .await;
            if result.success {
                debug!(%framework, used_fallback = result.used_fallback, "framework shims ready");
            } else {
                warn!(%framework, failed = ?result.failed_shims, "framework shims unavailable");
            }
        });
        self.pending_shims.lock().push(handle);
    }

    /// Starts loading the generic shims for the components a document uses.
    pub fn load_generic_shims(
        &self,
        component_names: Vec<String>,
        shim_loaders: HashMap<String, ShimLoader>,
    ) {
        let registry = Arc::clone(self.registry());
        let policy = self.shim_policy;
        let handle = tokio::spawn(async move {
            let result =
                load_generic_shims_with_retry(&registry, &component_names, &shim_loaders, &policy)
                    .await;
            if !result.failed.is_empty() {
                warn!(failed = ?result.failed, "some generic shims failed to load");
            }
        });
        self.pending_shims.lock().push(handle);
    }

    async fn await_pending_shims(&self) {
        let handles = std::mem::take(&mut *self.pending_shims.lock());
        if handles.is_empty() {
            return;
        }
        for outcome in join_all(handles).await {
            if let Err(err) = outcome {
                warn!(error = %err, "shim load task ended abnormally");
            }
        }
    }

    // == Evaluation ==
    /// Loads `entry` for display, invalidating whatever the previous
    /// evaluation left behind.
    pub async fn evaluate_entry(
        &self,
        entry: &str,
        code: &str,
        dependencies: &[String],
        fetcher: Arc<dyn ModuleFetcher>,
    ) -> Result<Arc<Module>> {
        self.await_pending_shims().await;

        let entry_changed = {
            let mut last_entry = self.last_entry.lock();
            let changed = last_entry.as_deref() != Some(entry);
            if changed {
                *last_entry = Some(entry.to_string());
            }
            changed
        };

        if entry_changed {
            info!(entry, "entry changed, resetting modules");
            self.registry().lock().clear_non_preloaded();
        } else {
            let mut registry = self.registry().lock();
            let invalidated = registry.invalidate_with_dependents(entry);
            registry.clear_dependencies();
            debug!(entry, invalidated = invalidated.len(), "re-evaluating entry");
        }
        clear_injected_styles(self.registry(), self.loader.styles().as_ref());

        self.loader
            .load_module(entry, code, dependencies, fetcher)
            .await
    }

    /// Drops every non-preloaded module and all styles. The next evaluation
    /// starts from a full reset whatever its entry.
    pub fn reset(&self) {
        self.registry().lock().clear_non_preloaded();
        clear_injected_styles(self.registry(), self.loader.styles().as_ref());
        *self.last_entry.lock() = None;
    }
}
