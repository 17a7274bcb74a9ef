//! Shim Loading
//!
//! Framework-specific shims are retried and fall back to generic shims;
//! generic shims are retried one by one. Neither path returns an error:
//! failures are reported in the result.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::{ModuleRegistry, SharedRegistry};
use crate::shim::{retry_load, RetryPolicy};

/// Name recorded when the generic fallback itself fails.
pub const GENERIC_FALLBACK: &str = "generic-fallback";

/// Documentation frameworks with dedicated shim sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Docusaurus,
    Starlight,
    Nextjs,
    Nextra,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Docusaurus => "docusaurus",
            Framework::Starlight => "starlight",
            Framework::Nextjs => "nextjs",
            Framework::Nextra => "nextra",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShimLoadResult {
    pub success: bool,
    pub framework: Framework,
    pub failed_shims: Vec<String>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenericShimLoadResult {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
}

/// Loads one generic component shim into the registry.
pub type ShimLoader = Arc<dyn Fn(SharedRegistry) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

// == Framework Shims ==
/// Loads a framework's shims with retry, falling back to the generic shims
/// once every attempt has failed.
pub async fn load_framework_shims_with_retry<F, Fut, G>(
    registry: &SharedRegistry,
    framework: Framework,
    policy: &RetryPolicy,
    mut framework_loader: F,
    generic_fallback: G,
) -> ShimLoadResult
where
    F: FnMut(SharedRegistry) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
    G: FnOnce(&mut ModuleRegistry) -> anyhow::Result<()>,
{
    let mut result = ShimLoadResult {
        success: false,
        framework,
        failed_shims: Vec::new(),
        used_fallback: false,
    };

    let name = format!("{} shims", framework);
    let outcome = retry_load(&name, policy, || framework_loader(Arc::clone(registry))).await;
    if outcome.succeeded() {
        debug!(%framework, attempts = outcome.attempts, "framework shims loaded");
        result.success = true;
        return result;
    }

    debug!(
        %framework,
        attempts = outcome.attempts,
        "framework shims failed, using generic fallback"
    );
    let fallback = generic_fallback(&mut registry.lock());
    match fallback {
        Ok(()) => {
            result.used_fallback = true;
            result.success = true;
        }
        Err(err) => {
            warn!(%framework, error = %err, "generic shim fallback failed");
            result.failed_shims.push(GENERIC_FALLBACK.to_string());
        }
    }
    result
}

// == Generic Shims ==
/// Loads the named component shims in parallel, each with its own retry.
///
/// Names without a registered loader are skipped. Results keep the order
/// of `component_names`.
pub async fn load_generic_shims_with_retry(
    registry: &SharedRegistry,
    component_names: &[String],
    shim_loaders: &HashMap<String, ShimLoader>,
    policy: &RetryPolicy,
) -> GenericShimLoadResult {
    let attempts = component_names.iter().filter_map(|name| {
        let Some(loader) = shim_loaders.get(name) else {
            debug!(shim = %name, "no loader for generic shim");
            return None;
        };
        Some(async move {
            let outcome = retry_load(name, policy, || loader(Arc::clone(registry))).await;
            if let (false, Some(err)) = (outcome.succeeded(), &outcome.last_error) {
                warn!(shim = %name, error = %err, "generic shim failed permanently");
            }
            (name.clone(), outcome.succeeded())
        })
    });

    let mut result = GenericShimLoadResult::default();
    for (name, loaded) in join_all(attempts).await {
        if loaded {
            result.loaded.push(name);
        } else {
            result.failed.push(name);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use futures::FutureExt;

    use crate::registry::Exports;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_framework_failure_falls_back() {
        let registry = ModuleRegistry::new().shared();
        let calls = AtomicU32::new(0);

        let result = load_framework_shims_with_retry(
            &registry,
            Framework::Docusaurus,
            &fast(2),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::anyhow!("shim bundle unavailable")) }
            },
            |registry| {
                registry.preload("npm://generic-shims", Exports::empty_object());
                Ok(())
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.used_fallback);
        assert!(result.success);
        assert!(result.failed_shims.is_empty());
        assert!(registry.lock().is_preloaded("npm://generic-shims"));
    }

    #[tokio::test]
    async fn test_framework_success_skips_fallback() {
        let registry = ModuleRegistry::new().shared();

        let result = load_framework_shims_with_retry(
            &registry,
            Framework::Starlight,
            &fast(2),
            |registry| async move {
                registry
                    .lock()
                    .preload("npm://starlight-shims", Exports::empty_object());
                Ok::<(), anyhow::Error>(())
            },
            |_| panic!("fallback must not run"),
        )
        .await;

        assert!(result.success);
        assert!(!result.used_fallback);
        assert!(registry.lock().has("npm://starlight-shims"));
    }

    #[tokio::test]
    async fn test_fallback_failure_is_reported_not_raised() {
        let registry = ModuleRegistry::new().shared();

        let result = load_framework_shims_with_retry(
            &registry,
            Framework::Nextra,
            &fast(0),
            |_| async { Err::<(), _>(anyhow::anyhow!("offline")) },
            |_| Err(anyhow::anyhow!("fallback broken")),
        )
        .await;

        assert!(!result.success);
        assert!(!result.used_fallback);
        assert_eq!(result.failed_shims, vec![GENERIC_FALLBACK.to_string()]);
    }

    #[tokio::test]
    async fn test_generic_shims_partition_results() {
        let registry = ModuleRegistry::new().shared();
        let flaky_calls = Arc::new(AtomicU32::new(0));

        let mut loaders: HashMap<String, ShimLoader> = HashMap::new();
        loaders.insert(
            "Tabs".to_string(),
            Arc::new(|registry: SharedRegistry| {
                async move {
                    registry.lock().preload("shim:Tabs", Exports::empty_object());
                    Ok::<(), anyhow::Error>(())
                }
                .boxed()
            }),
        );
        loaders.insert(
            "Admonition".to_string(),
            Arc::new(|_: SharedRegistry| {
                async { Err::<(), _>(anyhow::anyhow!("always broken")) }.boxed()
            }),
        );
        let counter = flaky_calls.clone();
        loaders.insert(
            "Callout".to_string(),
            Arc::new(move |_: SharedRegistry| {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < 2 {
                        anyhow::bail!("transient");
                    }
                    Ok(())
                }
                .boxed()
            }),
        );

        let names: Vec<String> = ["Tabs", "Admonition", "Missing", "Callout"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        let result = load_generic_shims_with_retry(&registry, &names, &loaders, &fast(1)).await;

        assert_eq!(result.loaded, vec!["Tabs".to_string(), "Callout".to_string()]);
        assert_eq!(result.failed, vec!["Admonition".to_string()]);
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
        assert!(registry.lock().has("shim:Tabs"));
    }

    #[test]
    fn test_framework_serde_names() {
        assert_eq!(serde_json::to_string(&Framework::Nextjs).unwrap(), "\"nextjs\"");
        assert_eq!(Framework::Docusaurus.to_string(), "docusaurus");
    }
}
