//! Dynamic Store
//!
//! A [`Store`] whose effective reducer follows a reference-counted set of
//! modules.
//!
//! # Activation
//!
//! The first `acquire` of a module:
//!
//! 1. records the module with count 1,
//! 2. recomposes the reducer (the new subtree is initialized by the
//!    replace action),
//! 3. starts the module's watcher unless it is already running,
//! 4. dispatches `@@MODULE/ADDED` with the module name.
//!
//! # Deactivation
//!
//! The last `release` of a module:
//!
//! 1. dispatches `@@MODULE/REMOVED` while the module is still active, so its
//!    own reducer and watcher observe the notification,
//! 2. stops the watcher unless another active module runs it,
//! 3. removes the entry,
//! 4. recomposes the reducer and evicts the subtree, unless another active
//!    module lives under the same name.
//!
//! Steps 2 to 4 are queued on the watcher runtime behind the notification.
//! A top-level `release` drains the queue before returning, so the module is
//! gone when it returns. A `release` made from inside a watcher returns with
//! the module still active; it is deactivated once every watcher has seen
//! the notification, including the module's own.
//!
//! If the module is acquired again before the deactivation runs, it stays
//! active and its watcher is restarted should it have finished.
//!
//! Both sequences run under the store gate, so concurrent dispatches from
//! other threads never interleave with a half-finished transition. The
//! dispatching thread may re-enter (a watcher may acquire or release modules
//! while reacting to a notification).

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::composer::ReducerComposer;
use super::registry::{Acquired, ModuleRegistry, Released};
use crate::error::StoreError;
use crate::module::Module;
use crate::store::{
    module_added, module_removed, Middleware, MiddlewareConfig, ReducerConfig, Store,
};
use crate::watcher::{Task, TaskRuntime, Watcher, WatcherScheduler};

/// Configuration accepted by [`create_dynamic_store`].
#[derive(Default)]
pub struct StoreConfig {
    /// The base reducer. Required.
    pub reducer: Option<ReducerConfig>,

    /// A watcher started once at creation and never stopped by module
    /// lifecycle.
    pub root_watcher: Option<Watcher>,

    /// Caller middleware. The watcher runtime always runs first.
    pub middleware: MiddlewareConfig,

    /// Initial root state.
    pub preloaded_state: Option<Value>,
}

impl StoreConfig {
    /// Start a configuration with a base reducer.
    pub fn new(reducer: impl Into<ReducerConfig>) -> Self {
        Self {
            reducer: Some(reducer.into()),
            ..Self::default()
        }
    }

    pub fn with_root_watcher(mut self, watcher: Watcher) -> Self {
        self.root_watcher = Some(watcher);
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_preloaded_state(mut self, state: Value) -> Self {
        self.preloaded_state = Some(state);
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("reducer", &self.reducer.is_some())
            .field("root_watcher", &self.root_watcher.as_ref().map(Watcher::id))
            .field("middleware", &self.middleware)
            .field("preloaded_state", &self.preloaded_state)
            .finish()
    }
}

struct Lifecycle {
    registry: Mutex<ModuleRegistry>,
    composer: ReducerComposer,
    watchers: WatcherScheduler,
    root_task: Option<Task>,
}

/// A store that can load and unload modules at runtime.
///
/// Dereferences to [`Store`] for `state`, `dispatch` and `subscribe`.
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct DynamicStore {
    store: Store,
    lifecycle: Arc<Lifecycle>,
}

/// Create a dynamic store.
///
/// Fails with [`StoreError::InvalidReducer`] when no reducer is configured.
pub fn create_dynamic_store(config: StoreConfig) -> Result<DynamicStore, StoreError> {
    let base = config
        .reducer
        .ok_or(StoreError::InvalidReducer)?
        .into_reducer();

    let runtime = TaskRuntime::new();
    let mut middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(runtime.clone())];
    middleware.extend(config.middleware.resolve());

    let store = Store::assemble(Arc::clone(&base), config.preloaded_state, middleware);
    runtime.bind(&store);

    let root_task = config.root_watcher.as_ref().map(|watcher| {
        tracing::debug!(watcher = %watcher.id(), "starting root watcher");
        runtime.run(watcher)
    });

    Ok(DynamicStore {
        store,
        lifecycle: Arc::new(Lifecycle {
            registry: Mutex::new(ModuleRegistry::new()),
            composer: ReducerComposer::new(base),
            watchers: WatcherScheduler::new(runtime),
            root_task,
        }),
    })
}

impl DynamicStore {
    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Take a reference to `module`, activating it on the first one.
    pub fn acquire(&self, module: &Module) {
        let _gate = self.store.lock_gate();

        let acquired = self.lifecycle.registry.lock().acquire(module);
        if let Acquired::Shared(count) = acquired {
            tracing::trace!(module = module.name(), count, "module shared");
            return;
        }

        tracing::debug!(module = module.name(), id = %module.id(), "activating module");
        self.recompose(&[]);
        if let Some(watcher) = module.watcher() {
            self.lifecycle.watchers.start(watcher);
        }
        self.store.dispatch(module_added(module.name()));
    }

    /// Give back a reference to `module`, deactivating it on the last one.
    ///
    /// Fails with [`StoreError::NotRegistered`] if the module holds no
    /// reference in this store.
    pub fn release(&self, module: &Module) -> Result<(), StoreError> {
        let _gate = self.store.lock_gate();

        let released = self.lifecycle.registry.lock().begin_release(module)?;
        if let Released::Remaining(count) = released {
            tracing::trace!(module = module.name(), count, "module still referenced");
            return Ok(());
        }

        self.store.dispatch(module_removed(module.name()));

        let store = self.clone();
        let module = module.clone();
        self.runtime().defer(move || store.deactivate(&module));
        Ok(())
    }

    /// Second half of a last release, run after the removal notification
    /// has been delivered.
    fn deactivate(&self, module: &Module) {
        let _gate = self.store.lock_gate();

        let deactivate = self.lifecycle.registry.lock().finish_release(module);
        if !deactivate {
            tracing::debug!(module = module.name(), "module re-acquired during removal");
            if let Some(watcher) = module.watcher() {
                self.lifecycle.watchers.start(watcher);
            }
            return;
        }

        tracing::debug!(module = module.name(), id = %module.id(), "deactivating module");
        if let Some(watcher) = module.watcher() {
            let shared = self.lifecycle.registry.lock().uses_watcher(watcher.id());
            if !shared {
                self.lifecycle.watchers.stop(watcher);
            }
        }

        let name_taken = self.lifecycle.registry.lock().has_name(module.name());
        let evict = if name_taken {
            Vec::new()
        } else {
            vec![module.name().to_string()]
        };
        self.recompose(&evict);
    }

    /// Active references held on `module`.
    pub fn ref_count(&self, module: &Module) -> usize {
        self.lifecycle.registry.lock().count(module)
    }

    /// Whether `module` is active.
    pub fn is_active(&self, module: &Module) -> bool {
        self.ref_count(module) > 0
    }

    /// Active modules in first-acquisition order.
    pub fn active_modules(&self) -> Vec<Module> {
        self.lifecycle.registry.lock().modules()
    }

    /// Whether `watcher` has a live task in this store.
    pub fn is_watcher_running(&self, watcher: &Watcher) -> bool {
        self.lifecycle.watchers.is_running(watcher.id())
            || self
                .lifecycle
                .root_task
                .as_ref()
                .is_some_and(|task| task.watcher() == watcher.id() && task.is_running())
    }

    /// The watcher runtime installed as the first middleware.
    pub fn runtime(&self) -> &TaskRuntime {
        self.lifecycle.watchers.runtime()
    }

    /// The task running the root watcher, if one was configured.
    pub fn root_task(&self) -> Option<&Task> {
        self.lifecycle.root_task.as_ref()
    }

    fn recompose(&self, evict: &[String]) {
        let modules = self.lifecycle.registry.lock().active_reducers();
        self.lifecycle.composer.install(&self.store, modules, evict);
    }
}

impl Deref for DynamicStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl fmt::Debug for DynamicStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicStore")
            .field("store", &self.store)
            .field("modules", &self.lifecycle.registry.lock().len())
            .field("watchers", &self.lifecycle.watchers.watcher_count())
            .finish()
    }
}
