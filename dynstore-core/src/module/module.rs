//! Module descriptors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::selector::Selector;
use crate::error::StoreError;
use crate::id::ModuleId;
use crate::store::{ActionCreator, Reducer};
use crate::watcher::Watcher;

/// Action creators generated for a module's case reducers, by case key.
#[derive(Debug, Clone, Default)]
pub struct ActionCreators {
    creators: IndexMap<String, ActionCreator>,
}

impl ActionCreators {
    pub(crate) fn insert(&mut self, key: String, creator: ActionCreator) {
        self.creators.insert(key, creator);
    }

    /// Look up a creator by case key.
    pub fn get(&self, key: &str) -> Option<&ActionCreator> {
        self.creators.get(key)
    }

    /// Iterate `(key, creator)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionCreator)> {
        self.creators.iter().map(|(key, creator)| (key.as_str(), creator))
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl Index<&str> for ActionCreators {
    type Output = ActionCreator;

    /// # Panics
    ///
    /// Panics if the module declares no case reducer under `key`.
    fn index(&self, key: &str) -> &ActionCreator {
        match self.get(key) {
            Some(creator) => creator,
            None => panic!("no action creator named `{key}`"),
        }
    }
}

pub(crate) struct ModuleParts {
    pub(crate) name: String,
    pub(crate) initial_state: Value,
    pub(crate) reducer: Reducer,
    pub(crate) actions: ActionCreators,
    pub(crate) selectors: IndexMap<String, Selector>,
}

struct ModuleInner {
    id: ModuleId,
    name: String,
    initial_state: Value,
    reducer: Reducer,
    actions: ActionCreators,
    selectors: IndexMap<String, Selector>,
    watcher: Option<Watcher>,
}

/// An immutable module descriptor: a named reducer, its selectors and an
/// optional watcher.
///
/// Identity is fixed at construction and shared by clones. Equality and
/// hashing use identity only, so two descriptors built from the same
/// configuration are different modules.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    pub(crate) fn from_parts(parts: ModuleParts) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                id: ModuleId::new(),
                name: parts.name,
                initial_state: parts.initial_state,
                reducer: parts.reducer,
                actions: parts.actions,
                selectors: parts.selectors,
                watcher: None,
            }),
        }
    }

    /// Attach a watcher built from the module's finalized action creators.
    ///
    /// Returns a new descriptor with its own identity.
    pub fn with_watcher<F>(self, build: F) -> Module
    where
        F: FnOnce(&ActionCreators) -> Watcher,
    {
        let watcher = build(&self.inner.actions);
        Self {
            inner: Arc::new(ModuleInner {
                id: ModuleId::new(),
                name: self.inner.name.clone(),
                initial_state: self.inner.initial_state.clone(),
                reducer: Arc::clone(&self.inner.reducer),
                actions: self.inner.actions.clone(),
                selectors: self.inner.selectors.clone(),
                watcher: Some(watcher),
            }),
        }
    }

    /// The module's identity.
    pub fn id(&self) -> ModuleId {
        self.inner.id
    }

    /// The state key the module lives under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The state the reducer starts from.
    pub fn initial_state(&self) -> &Value {
        &self.inner.initial_state
    }

    /// The module reducer, over the module's own subtree.
    pub fn reducer(&self) -> &Reducer {
        &self.inner.reducer
    }

    /// Generated action creators.
    pub fn actions(&self) -> &ActionCreators {
        &self.inner.actions
    }

    /// Look up a selector.
    pub fn selector(&self, key: &str) -> Option<&Selector> {
        self.inner.selectors.get(key)
    }

    /// Iterate selector keys in declaration order.
    pub fn selector_keys(&self) -> impl Iterator<Item = &str> {
        self.inner.selectors.keys().map(String::as_str)
    }

    /// The watcher, if one is attached.
    pub fn watcher(&self) -> Option<&Watcher> {
        self.inner.watcher.as_ref()
    }

    /// Run the selector `key` against the root state.
    pub fn select(&self, key: &str, root: &Value) -> Result<Value, StoreError> {
        let selector = self.selector(key).ok_or_else(|| StoreError::UnknownSelector {
            module: self.inner.name.clone(),
            key: key.to_string(),
        })?;
        selector.select(root).ok_or_else(|| StoreError::ModuleNotLoaded {
            name: self.inner.name.clone(),
        })
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Module {}

impl Hash for Module {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("selectors", &self.inner.selectors.keys().collect::<Vec<_>>())
            .field("watcher", &self.inner.watcher.as_ref().map(Watcher::id))
            .finish()
    }
}
