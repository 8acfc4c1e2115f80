//! Store Implementation
//!
//! The store owns the root state, the current reducer and the dispatch
//! chain. It is the container the dynamic module layer builds on.
//!
//! # Dispatch
//!
//! 1. The action enters the middleware chain.
//! 2. The end of the chain runs the current reducer against the current
//!    state. The reducer reference is read once per action, so a dispatch
//!    never observes a half-installed reducer.
//! 3. The new state is published and listeners are called.
//!
//! Dispatch is synchronous and re-entrant on the dispatching thread: a
//! middleware or listener may dispatch again and that action is fully reduced
//! before the inner call returns. Other threads wait on the store gate.
//!
//! # Locks
//!
//! No lock is held while user code runs. The state is published as an
//! `Arc<Value>` so readers never block writers for long.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde_json::Value;

use super::action::{Action, STORE_INIT, STORE_REPLACE};
use super::middleware::{Middleware, MiddlewareConfig, Next};
use super::reducer::{Reducer, ReducerConfig};
use crate::id::ListenerId;

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Options accepted by [`Store::with_options`].
#[derive(Debug, Default)]
pub struct StoreOptions {
    /// State handed to the reducer together with the init action.
    pub preloaded_state: Option<Value>,

    /// Middleware assembly.
    pub middleware: MiddlewareConfig,
}

pub(crate) struct StoreInner {
    /// Serializes dispatches and reducer replacement across threads while
    /// letting the dispatching thread re-enter.
    gate: ReentrantMutex<()>,

    reducer: RwLock<Reducer>,

    state: RwLock<Arc<Value>>,

    listeners: RwLock<IndexMap<ListenerId, Listener>>,

    middleware: Arc<[Arc<dyn Middleware>]>,

    /// Set while a reducer is running.
    reducing: AtomicBool,
}

/// A state container: `dispatch`, `subscribe`, `replace_reducer`.
///
/// Cloning a store yields another handle to the same container.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// A non-owning store handle.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// A handle that never upgrades.
    pub(crate) fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Get the store back if it is still alive.
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Clears the reducing flag even if the reducer panics.
struct ReducingGuard<'a>(&'a AtomicBool);

impl Drop for ReducingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Store {
    /// Create a store with default options.
    pub fn new(reducer: impl Into<ReducerConfig>) -> Self {
        Self::with_options(reducer, StoreOptions::default())
    }

    /// Create a store.
    pub fn with_options(reducer: impl Into<ReducerConfig>, options: StoreOptions) -> Self {
        Self::assemble(
            reducer.into().into_reducer(),
            options.preloaded_state,
            options.middleware.resolve(),
        )
    }

    /// Build the store from resolved parts and run the init action through
    /// the reducer. Middleware does not see the init action.
    pub(crate) fn assemble(
        reducer: Reducer,
        preloaded_state: Option<Value>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        let initial = reducer(preloaded_state.as_ref(), &Action::bare(STORE_INIT));
        tracing::debug!(middleware = middleware.len(), "store created");

        Self {
            inner: Arc::new(StoreInner {
                gate: ReentrantMutex::new(()),
                reducer: RwLock::new(reducer),
                state: RwLock::new(Arc::new(initial)),
                listeners: RwLock::new(IndexMap::new()),
                middleware: middleware.into(),
                reducing: AtomicBool::new(false),
            }),
        }
    }

    /// Get a snapshot of the current state.
    pub fn state(&self) -> Arc<Value> {
        self.inner.state.read().clone()
    }

    /// Read the current state through a function.
    pub fn select<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Value) -> R,
    {
        let state = self.state();
        f(&state)
    }

    /// Dispatch an action through the middleware chain.
    ///
    /// Dispatching from inside a reducer is refused and logged.
    pub fn dispatch(&self, action: Action) {
        let _gate = self.lock_gate();

        if self.inner.reducing.load(Ordering::SeqCst) {
            tracing::warn!(action = %action.kind, "reducers may not dispatch actions; dropped");
            return;
        }

        let chain = Arc::clone(&self.inner.middleware);
        Next::new(self, &chain).run(action);
    }

    /// Apply the current reducer and notify listeners.
    ///
    /// This is the end of the middleware chain.
    pub(crate) fn reduce(&self, action: Action) {
        let _gate = self.lock_gate();

        let reducer = self.inner.reducer.read().clone();
        let previous = self.state();

        let next = {
            self.inner.reducing.store(true, Ordering::SeqCst);
            let _reducing = ReducingGuard(&self.inner.reducing);
            reducer(Some(&previous), &action)
        };

        *self.inner.state.write() = Arc::new(next);
        self.notify();
    }

    /// Install a new reducer and run the replace action through it.
    pub fn replace_reducer(&self, reducer: Reducer) {
        self.replace_reducer_evicting(reducer, &[]);
    }

    /// Install a new reducer, drop `evict` keys from the root state, then run
    /// the replace action through the new reducer. The whole step happens
    /// under the store gate.
    pub(crate) fn replace_reducer_evicting(&self, reducer: Reducer, evict: &[String]) {
        let _gate = self.lock_gate();

        *self.inner.reducer.write() = reducer;

        if !evict.is_empty() {
            let mut state = self.inner.state.write();
            let mut pruned: Value = (**state).clone();
            if let Value::Object(map) = &mut pruned {
                for key in evict {
                    map.remove(key);
                }
            }
            *state = Arc::new(pruned);
        }

        tracing::trace!(evicted = evict.len(), "reducer replaced");
        self.reduce(Action::bare(STORE_REPLACE));
    }

    /// Register a listener called with the new state after every reduction.
    ///
    /// The listener stays registered until the returned handle is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.inner.listeners.write().insert(id, Arc::new(listener));
        Subscription {
            id,
            store: self.downgrade(),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Get a non-owning handle.
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same container.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Hold the dispatch gate for the duration of a multi-step operation.
    pub(crate) fn lock_gate(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.gate.lock()
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self.inner.listeners.read().values().cloned().collect();
        if listeners.is_empty() {
            return;
        }
        let state = self.state();
        for listener in listeners {
            listener(&state);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("listener_count", &self.listener_count())
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping this handle unsubscribes the listener.
pub struct Subscription {
    id: ListenerId,
    store: WeakStore,
}

impl Subscription {
    /// The listener's identity.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.inner.listeners.write().shift_remove(&self.id);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::reducer::reducer;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn counter() -> Reducer {
        reducer(|state, action| {
            let count = state.and_then(Value::as_i64).unwrap_or(0);
            match action.kind.as_str() {
                "inc" => json!(count + 1),
                "add" => json!(count + action.payload.as_i64().unwrap_or(0)),
                _ => json!(count),
            }
        })
    }

    #[test]
    fn store_initializes_through_reducer() {
        let store = Store::new(counter());
        assert_eq!(*store.state(), json!(0));
    }

    #[test]
    fn store_respects_preloaded_state() {
        let options = StoreOptions {
            preloaded_state: Some(json!(41)),
            ..StoreOptions::default()
        };
        let store = Store::with_options(counter(), options);
        store.dispatch(Action::bare("inc"));
        assert_eq!(*store.state(), json!(42));
    }

    #[test]
    fn dispatch_applies_reducer() {
        let store = Store::new(counter());
        store.dispatch(Action::bare("inc"));
        store.dispatch(Action::new("add", 5));
        assert_eq!(*store.state(), json!(6));
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let store = Store::new(counter());
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let subscription = store.subscribe(move |_state| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.listener_count(), 1);

        store.dispatch(Action::bare("inc"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(subscription);
        assert_eq!(store.listener_count(), 0);

        store.dispatch(Action::bare("inc"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replace_reducer_runs_replace_action() {
        let store = Store::new(counter());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        store.replace_reducer(reducer(move |state, action| {
            seen_clone.lock().push(action.kind.clone());
            state.cloned().unwrap_or(json!(0))
        }));

        assert_eq!(*seen.lock(), vec![STORE_REPLACE.to_string()]);
    }

    #[test]
    fn replace_reducer_evicting_drops_keys() {
        let store = Store::with_options(
            reducer(|state, _action| state.cloned().unwrap_or(json!({}))),
            StoreOptions {
                preloaded_state: Some(json!({ "keep": 1, "drop": 2 })),
                ..StoreOptions::default()
            },
        );

        store.replace_reducer_evicting(
            reducer(|state, _action| state.cloned().unwrap_or(json!({}))),
            &["drop".to_string()],
        );

        assert_eq!(*store.state(), json!({ "keep": 1 }));
    }

    #[test]
    fn listener_may_dispatch() {
        let store = Store::new(counter());
        let weak = store.downgrade();
        let _subscription = store.subscribe(move |state| {
            if state.as_i64() == Some(1) {
                if let Some(store) = weak.upgrade() {
                    store.dispatch(Action::bare("inc"));
                }
            }
        });

        store.dispatch(Action::bare("inc"));
        assert_eq!(*store.state(), json!(2));
    }

    #[test]
    fn reducer_dispatch_is_dropped() {
        let slot: Arc<parking_lot::Mutex<Option<WeakStore>>> = Arc::new(parking_lot::Mutex::new(None));
        let slot_clone = slot.clone();
        let store = Store::new(reducer(move |state, action| {
            if action.is("nested") {
                if let Some(store) = slot_clone.lock().as_ref().and_then(WeakStore::upgrade) {
                    store.dispatch(Action::bare("inc"));
                }
            }
            let count = state.and_then(Value::as_i64).unwrap_or(0);
            json!(if action.is("inc") { count + 1 } else { count })
        }));
        *slot.lock() = Some(store.downgrade());

        store.dispatch(Action::bare("nested"));
        assert_eq!(*store.state(), json!(0));
    }
}
