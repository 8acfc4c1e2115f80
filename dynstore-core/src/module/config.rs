//! Module construction.
//!
//! A [`ModuleConfig`] names the module, gives its initial state and lists
//! case reducers, reactions to foreign action types and selectors. Building
//! it produces the module reducer, one action creator per case reducer
//! (typed `"{name}/{key}"`) and the scoped selectors.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use super::module::{ActionCreators, Module, ModuleParts};
use super::selector::{Selector, SelectorFn};
use crate::error::StoreError;
use crate::store::{reducer, Action, ActionCreator};

/// A case reducer: mutates the module's state in place for one action type.
pub type CaseReducer = Arc<dyn Fn(&mut Value, &Action) + Send + Sync>;

/// Declarative description of a module.
///
/// # Example
///
/// ```rust,ignore
/// let counter = ModuleConfig::new("counter")
///     .initial_state(json!({ "value": 0 }))
///     .reducer("increment", |state, _action| {
///         state["value"] = json!(state["value"].as_i64().unwrap_or(0) + 1);
///     })
///     .selector("value", |state| state["value"].clone())
///     .build()?;
/// ```
pub struct ModuleConfig {
    name: String,
    initial_state: Value,
    reducers: IndexMap<String, CaseReducer>,
    extra_reducers: Vec<(String, CaseReducer)>,
    selectors: IndexMap<String, SelectorFn>,
}

impl ModuleConfig {
    /// Start a module named `name`. The initial state defaults to `{}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_state: Value::Object(Map::new()),
            reducers: IndexMap::new(),
            extra_reducers: Vec::new(),
            selectors: IndexMap::new(),
        }
    }

    /// Set the initial state.
    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    /// Add a case reducer for the module's own action `"{name}/{key}"`.
    pub fn reducer<F>(mut self, key: impl Into<String>, case: F) -> Self
    where
        F: Fn(&mut Value, &Action) + Send + Sync + 'static,
    {
        self.reducers.insert(key.into(), Arc::new(case));
        self
    }

    /// React to an action type the module does not own.
    pub fn extra_reducer<F>(mut self, action_type: impl Into<String>, case: F) -> Self
    where
        F: Fn(&mut Value, &Action) + Send + Sync + 'static,
    {
        self.extra_reducers.push((action_type.into(), Arc::new(case)));
        self
    }

    /// Add a selector over the module's subtree.
    pub fn selector<F>(mut self, key: impl Into<String>, select: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.selectors.insert(key.into(), Arc::new(select));
        self
    }

    /// Build the module.
    pub fn build(self) -> Result<Module, StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::EmptyModuleName);
        }

        let mut cases: IndexMap<String, SmallVec<[CaseReducer; 1]>> = IndexMap::new();
        let mut actions = ActionCreators::default();

        for (key, case) in self.reducers {
            let kind = format!("{}/{}", self.name, key);
            cases.entry(kind.clone()).or_default().push(case);
            actions.insert(key, ActionCreator::new(kind));
        }
        for (kind, case) in self.extra_reducers {
            cases.entry(kind).or_default().push(case);
        }

        let initial = self.initial_state.clone();
        let module_reducer = reducer(move |state, action| {
            let current = state.cloned().unwrap_or_else(|| initial.clone());
            match cases.get(&action.kind) {
                Some(handlers) => {
                    let mut draft = current;
                    for handler in handlers {
                        handler(&mut draft, action);
                    }
                    draft
                }
                None => current,
            }
        });

        let name: Arc<str> = Arc::from(self.name.as_str());
        let selectors = self
            .selectors
            .into_iter()
            .map(|(key, select)| {
                let selector = Selector::new(Arc::clone(&name), &key, select);
                (key, selector)
            })
            .collect();

        Ok(Module::from_parts(ModuleParts {
            name: self.name,
            initial_state: self.initial_state,
            reducer: module_reducer,
            actions,
            selectors,
        }))
    }
}

/// Build a module from its configuration.
pub fn create_module(config: ModuleConfig) -> Result<Module, StoreError> {
    config.build()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
