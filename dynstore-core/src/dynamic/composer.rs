//! Reducer Composer
//!
//! Derives the store's effective reducer from the active module set.
//!
//! The composed reducer runs every module reducer on its own key of the root
//! state, carries every other key through unchanged, then runs the base
//! reducer over the result. The base reducer therefore sees module subtrees
//! and every action, including the lifecycle notifications.
//!
//! With no active modules the composed reducer is the base reducer itself.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::store::{reducer, Reducer, Store};

/// Builds and installs composed reducers over a fixed base reducer.
pub struct ReducerComposer {
    base: Reducer,
}

impl ReducerComposer {
    /// Create a composer layering modules under `base`.
    pub fn new(base: Reducer) -> Self {
        Self { base }
    }

    /// The base reducer.
    pub fn base(&self) -> &Reducer {
        &self.base
    }

    /// Compose `modules` (`{name: reducer}`) with the base reducer.
    pub fn compose(&self, modules: IndexMap<String, Reducer>) -> Reducer {
        if modules.is_empty() {
            return Arc::clone(&self.base);
        }

        let base = Arc::clone(&self.base);
        reducer(move |state, action| {
            let mut root = match state {
                Some(Value::Object(map)) => map.clone(),
                Some(other) => {
                    tracing::warn!(
                        state = %other,
                        "root state is not an object; replaced by module subtrees"
                    );
                    Map::new()
                }
                None => Map::new(),
            };
            for (name, module_reducer) in &modules {
                let next = module_reducer(root.get(name), action);
                root.insert(name.clone(), next);
            }
            base(Some(&Value::Object(root)), action)
        })
    }

    /// Compose and install into `store` in one step, evicting the subtrees
    /// named in `evict` from the state first.
    pub fn install(&self, store: &Store, modules: IndexMap<String, Reducer>, evict: &[String]) {
        let count = modules.len();
        store.replace_reducer_evicting(self.compose(modules), evict);
        tracing::trace!(modules = count, evicted = ?evict, "reducer recomposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{identity_reducer, Action};
    use serde_json::json;

    fn slice(initial: i64) -> Reducer {
        reducer(move |state, action| {
            let n = state.and_then(Value::as_i64).unwrap_or(initial);
            json!(if action.is("inc") { n + 1 } else { n })
        })
    }

    #[test]
    fn empty_set_is_exactly_the_base() {
        let base = identity_reducer();
        let composer = ReducerComposer::new(base.clone());
        let composed = composer.compose(IndexMap::new());
        assert!(Arc::ptr_eq(&composed, &base));
    }

    #[test]
    fn modules_reduce_their_own_keys() {
        let composer = ReducerComposer::new(identity_reducer());
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), slice(0));
        modules.insert("b".to_string(), slice(10));
        let composed = composer.compose(modules);

        let state = composed(Some(&json!({ "static": true })), &Action::bare("init"));
        assert_eq!(state, json!({ "static": true, "a": 0, "b": 10 }));

        let state = composed(Some(&state), &Action::bare("inc"));
        assert_eq!(state, json!({ "static": true, "a": 1, "b": 11 }));
    }

    #[test]
    fn base_runs_after_modules() {
        // The base strips the key named by a "drop" action.
        let base = reducer(|state, action| {
            let mut state = state.cloned().unwrap_or_else(|| json!({}));
            if action.is("drop") {
                if let (Value::Object(map), Some(key)) = (&mut state, action.payload_str()) {
                    map.remove(key);
                }
            }
            state
        });
        let composer = ReducerComposer::new(base);
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), slice(0));
        let composed = composer.compose(modules);

        let state = composed(Some(&json!({})), &Action::new("drop", "a"));
        assert_eq!(state, json!({}));
    }

    #[test]
    fn non_object_root_is_replaced() {
        let composer = ReducerComposer::new(identity_reducer());
        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), slice(1));
        let composed = composer.compose(modules);

        let state = composed(Some(&json!(42)), &Action::bare("init"));
        assert_eq!(state, json!({ "a": 1 }));
    }

    #[test]
    fn install_evicts_and_initializes() {
        let store = Store::new(identity_reducer());
        let composer = ReducerComposer::new(identity_reducer());

        let mut modules = IndexMap::new();
        modules.insert("a".to_string(), slice(5));
        composer.install(&store, modules, &[]);
        assert_eq!(*store.state(), json!({ "a": 5 }));

        composer.install(&store, IndexMap::new(), &["a".to_string()]);
        assert_eq!(*store.state(), json!({}));
    }
}
