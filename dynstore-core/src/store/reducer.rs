//! Reducers and reducer composition.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::action::Action;

/// A pure state transition.
///
/// `None` stands for "no state yet"; the reducer must answer with its
/// initial state in that case.
pub type Reducer = Arc<dyn Fn(Option<&Value>, &Action) -> Value + Send + Sync>;

/// Wrap a closure as a [`Reducer`].
pub fn reducer<F>(f: F) -> Reducer
where
    F: Fn(Option<&Value>, &Action) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The reducer a store is configured with.
#[derive(Clone)]
pub enum ReducerConfig {
    /// A single reducer over the whole root state.
    Function(Reducer),

    /// Named slice reducers, combined with [`combine_reducers`].
    Slices(IndexMap<String, Reducer>),
}

impl ReducerConfig {
    /// Resolve into a single root reducer.
    pub fn into_reducer(self) -> Reducer {
        match self {
            Self::Function(reducer) => reducer,
            Self::Slices(slices) => combine_reducers(slices),
        }
    }
}

impl From<Reducer> for ReducerConfig {
    fn from(reducer: Reducer) -> Self {
        Self::Function(reducer)
    }
}

impl From<IndexMap<String, Reducer>> for ReducerConfig {
    fn from(slices: IndexMap<String, Reducer>) -> Self {
        Self::Slices(slices)
    }
}

/// Combine slice reducers into one reducer over an object keyed by slice name.
///
/// Each slice reducer sees only its own key. Keys the combination does not
/// own are carried through untouched, so module subtrees layered over a
/// combined base reducer survive the base step.
pub fn combine_reducers(slices: IndexMap<String, Reducer>) -> Reducer {
    Arc::new(move |state: Option<&Value>, action: &Action| {
        let mut next = match state {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for (key, slice) in &slices {
            let reduced = slice(next.get(key), action);
            next.insert(key.clone(), reduced);
        }
        Value::Object(next)
    })
}

/// The reducer that returns an empty object initially and the state unchanged
/// afterwards.
pub fn identity_reducer() -> Reducer {
    reducer(|state, _action| {
        state
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    })
}
