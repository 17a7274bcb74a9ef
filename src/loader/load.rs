//! Recursive Module Loader
//!
//! Loads a module together with its full dependency closure:
//!
//! 1. Fail once the recursion depth exceeds the configured maximum.
//! 2. Return cached modules immediately.
//! 3. Join a load of the same id that is already in progress, unless that
//!    load is itself waiting on the requester (a cycle). Cyclic imports are
//!    left to the outer load and resolve once it finishes. Loads overtaken
//!    by a reset are unregistered, so they defer on their own import chain
//!    instead.
//! 4. Fetch uncached dependencies in parallel, bounded by the fetch
//!    semaphore and deduplicated per `(parent, specifier)`.
//! 5. Inject stylesheets in declaration order, then load the remaining
//!    dependencies recursively in parallel.
//! 6. Evaluate the module and store it.
//!
//! Each registered load runs as its own task. Awaiters that give up do not
//! cancel it, and the task clears the pending registration when it settles.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_MODULE_LOAD_DEPTH};
use crate::error::{ModuleError, Result};
use crate::loader::circular::WaitGraph;
use crate::loader::fetch::is_bare_import;
use crate::loader::semaphore::FetchSemaphore;
use crate::loader::{
    inject_styles, Evaluator, FetchResult, ModuleFetcher, ModuleRuntime, StyleInjector,
    SyncRequire,
};
use crate::registry::{Exports, Module, ModuleRegistry, PendingModule, SharedRegistry};

type FetchKey = (String, String);
type SharedFetch = Shared<BoxFuture<'static, Result<Option<FetchResult>>>>;

// == Loader Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub max_module_load_depth: usize,
    pub max_concurrent_fetches: usize,
    /// Specifier or resolved path -> preloaded module id
    pub preload_aliases: Arc<HashMap<String, String>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_module_load_depth: DEFAULT_MAX_MODULE_LOAD_DEPTH,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            preload_aliases: Arc::new(HashMap::new()),
        }
    }
}

/// Partial loader reconfiguration; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfigUpdate {
    pub max_module_load_depth: Option<usize>,
    pub max_concurrent_fetches: Option<usize>,
    pub preload_aliases: Option<HashMap<String, String>>,
}

/// A module to load: its id, compiled source and declared imports.
#[derive(Debug, Clone)]
struct LoadRequest {
    id: String,
    code: String,
    dependencies: Vec<String>,
}

/// The load that asked for a dependency, with the registry generation it
/// started under.
#[derive(Debug, Clone)]
struct Requester {
    id: String,
    generation: u64,
    /// Ids from the top-level load down to and including `id`
    chain: Vec<String>,
}

/// How a load obtains its module.
enum Start {
    Cached(Arc<Module>),
    /// The module is pending and already waits on the requester
    Deferred,
    Await(PendingModule, WaitGuard),
    /// Part of a load that began before a reset; runs unregistered
    Detached(BoxFuture<'static, Result<Arc<Module>>>),
}

// == Module Loader ==
/// Recursive loader over a shared registry.
///
/// Cloning is cheap; clones share in-flight fetches, the fetch semaphore
/// and configuration.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    registry: SharedRegistry,
    evaluator: Arc<dyn Evaluator>,
    styles: Arc<dyn StyleInjector>,
    config: RwLock<LoaderConfig>,
    semaphore: Mutex<FetchSemaphore>,
    in_flight: Mutex<HashMap<FetchKey, SharedFetch>>,
    waits: Mutex<WaitGraph>,
}

impl ModuleLoader {
    pub fn new(
        registry: SharedRegistry,
        evaluator: Arc<dyn Evaluator>,
        styles: Arc<dyn StyleInjector>,
        config: LoaderConfig,
    ) -> Self {
        let semaphore = FetchSemaphore::new(config.max_concurrent_fetches);
        Self {
            inner: Arc::new(LoaderInner {
                registry,
                evaluator,
                styles,
                config: RwLock::new(config),
                semaphore: Mutex::new(semaphore),
                in_flight: Mutex::new(HashMap::new()),
                waits: Mutex::new(WaitGraph::new()),
            }),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    pub fn styles(&self) -> &Arc<dyn StyleInjector> {
        &self.inner.styles
    }

    pub fn config(&self) -> LoaderConfig {
        self.inner.config.read().clone()
    }

    /// Applies new settings. Loads already running keep the settings they
    /// started with; a concurrency change takes effect for the next fetch.
    pub fn configure(&self, update: LoaderConfigUpdate) {
        let mut config = self.inner.config.write();
        if let Some(depth) = update.max_module_load_depth {
            config.max_module_load_depth = depth;
        }
        if let Some(concurrency) = update.max_concurrent_fetches {
            config.max_concurrent_fetches = concurrency;
        }
        if let Some(aliases) = update.preload_aliases {
            config.preload_aliases = Arc::new(aliases);
        }
    }

    /// Number of `(parent, specifier)` fetches currently outstanding.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    // == Load Module ==
    /// Loads `id` and its dependency closure, returning the evaluated module.
    pub async fn load_module(
        &self,
        id: &str,
        code: &str,
        dependencies: &[String],
        fetcher: Arc<dyn ModuleFetcher>,
    ) -> Result<Arc<Module>> {
        self.load_module_at_depth(id, code, dependencies, fetcher, 0)
            .await
    }

    /// Like [`load_module`](Self::load_module), starting at recursion `depth`.
    pub async fn load_module_at_depth(
        &self,
        id: &str,
        code: &str,
        dependencies: &[String],
        fetcher: Arc<dyn ModuleFetcher>,
        depth: usize,
    ) -> Result<Arc<Module>> {
        let request = LoadRequest {
            id: id.to_string(),
            code: code.to_string(),
            dependencies: dependencies.to_vec(),
        };

        // Without a requester there is no one to wait on, so a load never defers
        self.load(request, fetcher, depth, None)
            .await?
            .ok_or_else(|| ModuleError::CircularDependency {
                module_id: id.to_string(),
                parent_id: None,
            })
    }

    /// Loads one module. `Ok(None)` means the load was deferred because the
    /// module is pending further up the requester's own chain.
    fn load(
        &self,
        request: LoadRequest,
        fetcher: Arc<dyn ModuleFetcher>,
        depth: usize,
        requester: Option<Requester>,
    ) -> BoxFuture<'static, Result<Option<Arc<Module>>>> {
        let loader = self.clone();
        async move {
            let max_depth = loader.inner.config.read().max_module_load_depth;
            if depth > max_depth {
                warn!(module_id = %request.id, depth, "module load depth exceeded");
                return Err(ModuleError::ModuleDepthExceeded {
                    module_id: request.id,
                    depth,
                });
            }

            match loader.start(request, fetcher, depth, requester) {
                Start::Cached(module) => Ok(Some(module)),
                Start::Deferred => Ok(None),
                Start::Await(load, guard) => {
                    let result = load.await;
                    drop(guard);
                    result.map(Some)
                }
                Start::Detached(load) => load.await.map(Some),
            }
        }
        .boxed()
    }

    /// Cache check, pending check and pending registration, done under a
    /// single registry lock so concurrent loads of one id cannot interleave.
    fn start(
        &self,
        request: LoadRequest,
        fetcher: Arc<dyn ModuleFetcher>,
        depth: usize,
        requester: Option<Requester>,
    ) -> Start {
        let mut registry = self.inner.registry.lock();
        if let Some(module) = registry.get(&request.id) {
            return Start::Cached(module);
        }

        let generation = requester
            .as_ref()
            .map_or(registry.generation(), |requester| requester.generation);
        let mut chain = requester
            .as_ref()
            .map(|requester| requester.chain.clone())
            .unwrap_or_default();

        if generation != registry.generation() {
            if chain.contains(&request.id) {
                debug!(
                    module_id = %request.id,
                    "circular import in a load overtaken by a reset, deferring"
                );
                return Start::Deferred;
            }
            chain.push(request.id.clone());
            return Start::Detached(
                self.clone()
                    .load_fresh(request, fetcher, depth, generation, chain)
                    .boxed(),
            );
        }
        chain.push(request.id.clone());

        let requester = requester.map(|requester| requester.id);
        let mut waits = self.inner.waits.lock();
        if let Some(pending) = registry.get_pending(&request.id) {
            if let Some(requester) = requester.as_deref() {
                if waits.would_deadlock(requester, &request.id) {
                    debug!(
                        module_id = %request.id,
                        requester,
                        "circular import, deferring to outer load"
                    );
                    return Start::Deferred;
                }
                waits.add(requester, &request.id);
            }
            return Start::Await(pending, WaitGuard::new(self, &request.id, requester));
        }

        let id = request.id.clone();
        let (sender, receiver) = oneshot::channel();
        let task_id = id.clone();
        let load = async move {
            receiver.await.unwrap_or_else(|_| {
                Err(ModuleError::evaluation_failed(
                    &task_id,
                    anyhow::anyhow!("load task ended without a result"),
                ))
            })
        }
        .boxed()
        .shared();
        let token = registry.set_pending(&id, load.clone());
        if let Some(requester) = requester.as_deref() {
            waits.add(requester, &id);
        }

        let registration = PendingRegistration {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
            token,
        };
        let work = self
            .clone()
            .load_fresh(request, fetcher, depth, generation, chain);
        tokio::spawn(async move {
            let result = work.await;
            drop(registration);
            // Every awaiter may be gone; the outcome is already recorded
            let _ = sender.send(result);
        });

        Start::Await(load, WaitGuard::new(self, &id, requester))
    }

    async fn load_fresh(
        self,
        request: LoadRequest,
        fetcher: Arc<dyn ModuleFetcher>,
        depth: usize,
        generation: u64,
        chain: Vec<String>,
    ) -> Result<Arc<Module>> {
        let LoadRequest {
            id,
            code,
            dependencies,
        } = request;
        let aliases = Arc::clone(&self.inner.config.read().preload_aliases);

        // Phase 1: split cached dependencies from those needing a fetch
        let to_fetch = self.uncached_dependencies(&id, &dependencies, &aliases, generation);

        // Phase 2: fetch in parallel
        let fetches = to_fetch.into_iter().map(|specifier| {
            let fetch = self.fetch_deduped(&id, &specifier, &fetcher);
            async move { fetch.await.map(|result| (specifier, result)) }
        });
        let fetched = try_join_all(fetches).await?;

        if let Some((specifier, _)) = fetched.iter().find(|(_, result)| result.is_none()) {
            warn!(module_id = %id, request = %specifier, "module not found");
            return Err(ModuleError::ModuleNotFound {
                request: specifier.clone(),
                parent_id: id,
            });
        }

        // Phase 3: stylesheets in declaration order, modules queued
        let mut children = Vec::new();
        for (specifier, result) in fetched {
            let Some(result) = result else {
                continue;
            };
            if let Some(child) = self.process_fetched(&id, &specifier, result, &aliases, generation) {
                children.push(self.load_child(&chain, child, &fetcher, depth, generation));
            }
        }

        // Phase 4: recursive loads in parallel
        try_join_all(children).await?;

        // Phase 5: evaluate
        let runtime = ModuleRuntime::new(
            &id,
            SyncRequire::new(Arc::clone(&self.inner.registry), &id, aliases),
        );
        let exports = self
            .inner
            .evaluator
            .evaluate(&code, &id, &runtime)
            .map_err(|err| {
                warn!(module_id = %id, error = %err, "module evaluation failed");
                ModuleError::evaluation_failed(&id, err)
            })?;

        let module = Arc::new(Module::new(id.as_str(), exports));
        self.record(generation, |registry| registry.set(&id, Arc::clone(&module)));
        debug!(module_id = %id, depth, "module loaded");
        Ok(module)
    }

    /// Records edges to already available dependencies and returns the
    /// specifiers that still need fetching.
    fn uncached_dependencies(
        &self,
        id: &str,
        dependencies: &[String],
        aliases: &HashMap<String, String>,
        generation: u64,
    ) -> Vec<String> {
        let mut registry = self.inner.registry.lock();
        let current = registry.generation() == generation;
        let mut to_fetch = Vec::new();

        for specifier in dependencies.iter().filter(|s| !s.is_empty()) {
            let available = if registry.has(specifier) {
                Some(specifier.as_str())
            } else {
                aliases
                    .get(specifier)
                    .filter(|alias| registry.has(alias))
                    .map(String::as_str)
            };

            match available {
                Some(target) if current => registry.add_dependency(id, target),
                Some(_) => {}
                None => to_fetch.push(specifier.clone()),
            }
        }
        to_fetch
    }

    /// Registers the resolution for one fetched dependency and handles
    /// preload aliases and stylesheets. Returns the module still to load.
    fn process_fetched(
        &self,
        id: &str,
        specifier: &str,
        result: FetchResult,
        aliases: &HashMap<String, String>,
        generation: u64,
    ) -> Option<LoadRequest> {
        let preloaded = {
            let mut registry = self.inner.registry.lock();
            let current = registry.generation() == generation;
            if current && result.fs_path != specifier {
                registry.set_resolution(id, specifier, &result.fs_path);
            }

            let preloaded = aliases
                .get(&result.fs_path)
                .filter(|preload_id| registry.has(preload_id));
            if let (Some(preload_id), true) = (preloaded, current) {
                registry.set_resolution(id, specifier, preload_id);
                registry.add_dependency(id, preload_id);
            }
            preloaded.is_some()
        };
        if preloaded {
            return None;
        }

        if let Some(css) = &result.css {
            inject_styles(&self.inner.registry, self.inner.styles.as_ref(), &result.fs_path, css);
            let module = Arc::new(Module::new(result.fs_path.as_str(), Exports::empty_object()));
            self.record(generation, |registry| {
                registry.set(&result.fs_path, module);
                registry.add_dependency(id, &result.fs_path);
            });
            return None;
        }

        Some(LoadRequest {
            id: result.fs_path,
            code: result.code,
            dependencies: result.dependencies,
        })
    }

    /// Loads a dependency one level deeper; the edge is recorded only after
    /// the load settles successfully. `chain` ends with the parent's id.
    fn load_child(
        &self,
        chain: &[String],
        child: LoadRequest,
        fetcher: &Arc<dyn ModuleFetcher>,
        depth: usize,
        generation: u64,
    ) -> BoxFuture<'static, Result<()>> {
        let loader = self.clone();
        let parent_id = chain.last().cloned().unwrap_or_default();
        let child_id = child.id.clone();
        let requester = Requester {
            id: parent_id.clone(),
            generation,
            chain: chain.to_vec(),
        };
        let load = self.load(child, Arc::clone(fetcher), depth + 1, Some(requester));

        async move {
            load.await?;
            loader.record(generation, |registry| {
                registry.add_dependency(&parent_id, &child_id)
            });
            Ok(())
        }
        .boxed()
    }

    // == Fetch ==
    /// Returns the shared fetch for `(parent_id, specifier)`, starting one if
    /// none is outstanding.
    ///
    /// Each fetch runs as its own task holding a semaphore permit, and
    /// removes itself from the in-flight map when it settles.
    fn fetch_deduped(
        &self,
        parent_id: &str,
        specifier: &str,
        fetcher: &Arc<dyn ModuleFetcher>,
    ) -> SharedFetch {
        let key = (parent_id.to_string(), specifier.to_string());
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(existing) = in_flight.get(&key) {
            debug!(parent_id, specifier, "joining in-flight fetch");
            return existing.clone();
        }

        let semaphore = self
            .inner
            .semaphore
            .lock()
            .for_capacity(self.inner.config.read().max_concurrent_fetches);
        let inner = Arc::clone(&self.inner);
        let fetcher = Arc::clone(fetcher);
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let (parent_id, specifier) = &task_key;
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => fetcher
                    .fetch(specifier, is_bare_import(specifier), parent_id)
                    .await
                    .map_err(|err| {
                        warn!(%parent_id, %specifier, error = %err, "fetch failed");
                        ModuleError::fetch_failed(specifier, parent_id, err)
                    }),
                Err(err) => Err(ModuleError::fetch_failed(specifier, parent_id, err.into())),
            };
            inner.in_flight.lock().remove(&task_key);
            result
        });

        let (parent, request) = key.clone();
        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(ModuleError::fetch_failed(&request, &parent, err.into())),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(key, shared.clone());
        shared
    }

    /// Runs a registry write unless a full reset happened since the load
    /// started.
    fn record<F>(&self, generation: u64, write: F)
    where
        F: FnOnce(&mut ModuleRegistry),
    {
        let mut registry = self.inner.registry.lock();
        if registry.generation() == generation {
            write(&mut registry);
        } else {
            debug!("registry was reset during load, discarding result");
        }
    }
}

// == Guards ==
/// Owned by a load task; clears the pending registration when the task
/// settles or is torn down, so a failed load never blocks later attempts.
struct PendingRegistration {
    inner: Arc<LoaderInner>,
    id: String,
    token: u64,
}

impl Drop for PendingRegistration {
    fn drop(&mut self) {
        self.inner
            .registry
            .lock()
            .clear_pending_if(&self.id, self.token);
    }
}

/// Owned by an awaiter; removes its wait edge when it stops waiting.
struct WaitGuard {
    inner: Arc<LoaderInner>,
    id: String,
    requester: Option<String>,
}

impl WaitGuard {
    fn new(loader: &ModuleLoader, id: &str, requester: Option<String>) -> Self {
        Self {
            inner: Arc::clone(&loader.inner),
            id: id.to_string(),
            requester,
        }
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if let Some(requester) = &self.requester {
            self.inner.waits.lock().remove(requester, &self.id);
        }
    }
}
