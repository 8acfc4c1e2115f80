//! Store Provider
//!
//! Makes a store ambiently available to the code running inside a scope.
//!
//! # Implementation
//!
//! A thread-local stack of store handles. [`StoreProvider::enter`] pushes a
//! handle and returns a guard that pops it when dropped, so providers nest
//! and the innermost one wins.

use std::cell::RefCell;
use std::sync::Arc;

use crate::dynamic::DynamicStore;
use crate::error::StoreError;
use crate::store::Store;

/// Something that can be provided: a plain or a dynamic store.
pub trait StoreHandle: Send + Sync {
    /// The underlying store.
    fn store(&self) -> &Store;

    /// The dynamic store, if this handle is one.
    fn as_dynamic(&self) -> Option<&DynamicStore> {
        None
    }
}

impl StoreHandle for Store {
    fn store(&self) -> &Store {
        self
    }
}

impl StoreHandle for DynamicStore {
    fn store(&self) -> &Store {
        DynamicStore::store(self)
    }

    fn as_dynamic(&self) -> Option<&DynamicStore> {
        Some(self)
    }
}

thread_local! {
    static PROVIDER_STACK: RefCell<Vec<Arc<dyn StoreHandle>>> = RefCell::new(Vec::new());
}

/// Guard that keeps a store provided until dropped.
#[must_use = "the store is only provided while the guard is alive"]
pub struct StoreProvider {
    depth: usize,
}

impl StoreProvider {
    /// Provide `store` to the current thread until the guard is dropped.
    pub fn enter<S: StoreHandle + 'static>(store: S) -> Self {
        let depth = PROVIDER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(Arc::new(store));
            stack.len()
        });
        Self { depth }
    }

    /// Whether any store is provided.
    pub fn is_active() -> bool {
        PROVIDER_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost provided store.
    pub fn current() -> Option<Arc<dyn StoreHandle>> {
        PROVIDER_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

impl Drop for StoreProvider {
    fn drop(&mut self) {
        PROVIDER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "StoreProvider dropped out of order"
            );
            stack.pop();
        });
    }
}

/// The innermost provided store.
pub fn use_store() -> Result<Arc<dyn StoreHandle>, StoreError> {
    StoreProvider::current().ok_or(StoreError::NoStoreInContext)
}

/// The innermost provided store, which must be dynamic.
pub fn use_dynamic_store() -> Result<DynamicStore, StoreError> {
    let handle = use_store()?;
    handle.as_dynamic().cloned().ok_or(StoreError::NotDynamic)
}
