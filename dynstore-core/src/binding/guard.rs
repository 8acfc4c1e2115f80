//! Scoped module usage.
//!
//! A [`ModuleGuard`] holds exactly one reference to one module in one
//! dynamic store. Swapping the module releases the old reference and
//! acquires the new one; dropping the guard releases it.

use std::fmt;

use serde_json::Value;

use super::provider::use_dynamic_store;
use crate::dynamic::DynamicStore;
use crate::error::StoreError;
use crate::module::Module;

/// Keeps a module loaded for as long as it lives.
#[must_use = "the module is released as soon as the guard is dropped"]
pub struct ModuleGuard {
    store: DynamicStore,
    module: Module,
}

impl ModuleGuard {
    pub(crate) fn acquire(store: DynamicStore, module: &Module) -> Self {
        store.acquire(module);
        Self {
            store,
            module: module.clone(),
        }
    }

    /// The module currently held.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The store the module is loaded into.
    pub fn store(&self) -> &DynamicStore {
        &self.store
    }

    /// Switch to `module`. A no-op when it is the module already held.
    ///
    /// The old module is released before the new one is acquired, as one
    /// transition on the store.
    pub fn update(&mut self, module: Option<&Module>) -> Result<(), StoreError> {
        let module = module.ok_or(StoreError::MissingModule)?;
        if *module == self.module {
            return Ok(());
        }

        let _gate = self.store.lock_gate();
        self.store.release(&self.module)?;
        self.store.acquire(module);
        tracing::debug!(from = self.module.name(), to = module.name(), "module swapped");
        self.module = module.clone();
        Ok(())
    }

    /// Run the held module's selector `key` against the current state.
    pub fn select(&self, key: &str) -> Result<Value, StoreError> {
        self.module.select(key, &self.store.state())
    }
}

impl Drop for ModuleGuard {
    fn drop(&mut self) {
        if let Err(err) = self.store.release(&self.module) {
            tracing::warn!(module = self.module.name(), error = %err, "module release failed");
        }
    }
}

impl fmt::Debug for ModuleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGuard")
            .field("module", &self.module)
            .finish()
    }
}

/// Load `module` into the provided dynamic store for the lifetime of the
/// returned guard.
pub fn use_module(module: Option<&Module>) -> Result<ModuleGuard, StoreError> {
    let module = module.ok_or(StoreError::MissingModule)?;
    let store = use_dynamic_store()?;
    Ok(ModuleGuard::acquire(store, module))
}

impl DynamicStore {
    /// Load `module` for the lifetime of the returned guard, without going
    /// through a provider.
    pub fn bind(&self, module: &Module) -> ModuleGuard {
        ModuleGuard::acquire(self.clone(), module)
    }
}
