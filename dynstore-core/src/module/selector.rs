//! Selector Implementation
//!
//! A selector reads a value out of a module's subtree. It is scoped: it is
//! handed the root state, looks up its module's key, and runs the user
//! function on that subtree only.
//!
//! # Caching
//!
//! Results are memoized on the subtree. Reading again while the subtree is
//! unchanged returns the cached result without calling the function. Any
//! change to the subtree (by value) recomputes. Changes elsewhere in the root
//! state never do.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

pub(crate) type SelectorFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A memoized read function over one module's subtree.
///
/// Clones share the cache.
#[derive(Clone)]
pub struct Selector {
    /// Root key of the owning module.
    module: Arc<str>,

    /// Name of this selector within the module.
    key: Arc<str>,

    compute: SelectorFn,

    /// Last input subtree and the result computed from it.
    cache: Arc<RwLock<Option<(Value, Value)>>>,

    /// Number of times the function actually ran.
    compute_count: Arc<AtomicUsize>,
}

impl Selector {
    pub(crate) fn new(module: Arc<str>, key: &str, compute: SelectorFn) -> Self {
        Self {
            module,
            key: Arc::from(key),
            compute,
            cache: Arc::new(RwLock::new(None)),
            compute_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Name of this selector within its module.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read from the root state.
    ///
    /// Returns `None` when the module's subtree is absent.
    pub fn select(&self, root: &Value) -> Option<Value> {
        root.get(&*self.module).map(|subtree| self.compute_on(subtree))
    }

    /// Get the number of times the function has run.
    pub fn compute_count(&self) -> usize {
        self.compute_count.load(Ordering::SeqCst)
    }

    /// Drop the cached result.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    fn compute_on(&self, subtree: &Value) -> Value {
        if let Some((input, output)) = self.cache.read().as_ref() {
            if input == subtree {
                return output.clone();
            }
        }

        let output = (self.compute)(subtree);
        self.compute_count.fetch_add(1, Ordering::SeqCst);
        *self.cache.write() = Some((subtree.clone(), output.clone()));
        output
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("module", &self.module)
            .field("key", &self.key)
            .field("compute_count", &self.compute_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_selector() -> Selector {
        Selector::new(
            Arc::from("counter"),
            "value",
            Arc::new(|state: &Value| state["value"].clone()),
        )
    }

    #[test]
    fn selector_reads_its_subtree() {
        let selector = value_selector();
        let root = json!({ "counter": { "value": 3 }, "other": { "value": 9 } });
        assert_eq!(selector.select(&root), Some(json!(3)));
    }

    #[test]
    fn selector_reports_absent_subtree() {
        let selector = value_selector();
        assert_eq!(selector.select(&json!({ "other": {} })), None);
        assert_eq!(selector.select(&json!(null)), None);
        assert_eq!(selector.compute_count(), 0);
    }

    #[test]
    fn selector_caches_on_unchanged_subtree() {
        let selector = value_selector();
        let root = json!({ "counter": { "value": 1 } });

        selector.select(&root);
        selector.select(&root);
        selector.select(&json!({ "counter": { "value": 1 }, "noise": true }));
        assert_eq!(selector.compute_count(), 1);

        selector.select(&json!({ "counter": { "value": 2 } }));
        assert_eq!(selector.compute_count(), 2);
    }

    #[test]
    fn selector_clone_shares_cache() {
        let selector = value_selector();
        let clone = selector.clone();
        let root = json!({ "counter": { "value": 1 } });

        selector.select(&root);
        clone.select(&root);
        assert_eq!(clone.compute_count(), 1);

        clone.invalidate();
        selector.select(&root);
        assert_eq!(selector.compute_count(), 2);
    }
}
