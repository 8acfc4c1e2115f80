//! Module Registry
//!
//! Reference counts per module identity. The registry only decides
//! transitions; the dynamic store performs the side effects.
//!
//! # Transitions
//!
//! - `acquire` on an absent module creates the entry with count 1 and
//!   reports [`Acquired::First`]. Otherwise it increments and reports
//!   [`Acquired::Shared`].
//!
//! - `begin_release` on count 1 marks the entry as releasing and reports
//!   [`Released::Last`]; the entry stays until `finish_release`, so the
//!   module is still active while its removal notification is processed.
//!   On a higher count it decrements and reports [`Released::Remaining`].
//!
//! - `finish_release` removes the entry if nobody re-acquired the module in
//!   the meantime. Otherwise it only takes back the released reference.

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::id::{ModuleId, WatcherId};
use crate::module::Module;
use crate::store::Reducer;

/// Outcome of [`ModuleRegistry::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// The module just became active.
    First,

    /// The module was already active; carries the new count.
    Shared(usize),
}

/// Outcome of [`ModuleRegistry::begin_release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The last reference is being released.
    Last,

    /// Other references remain; carries the new count.
    Remaining(usize),
}

#[derive(Debug)]
struct Entry {
    module: Module,
    count: usize,
    releasing: bool,
}

/// Module identity to active reference count, in first-acquisition order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: IndexMap<ModuleId, Entry>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to `module`.
    pub fn acquire(&mut self, module: &Module) -> Acquired {
        match self.entries.get_mut(&module.id()) {
            Some(entry) => {
                entry.count += 1;
                Acquired::Shared(entry.count)
            }
            None => {
                self.entries.insert(
                    module.id(),
                    Entry {
                        module: module.clone(),
                        count: 1,
                        releasing: false,
                    },
                );
                Acquired::First
            }
        }
    }

    /// Give back a reference to `module`.
    ///
    /// Fails if the module holds no reference, including the case of a
    /// second release of a last reference whose removal is in progress.
    pub fn begin_release(&mut self, module: &Module) -> Result<Released, StoreError> {
        let not_registered = || StoreError::NotRegistered {
            name: module.name().to_string(),
        };
        let entry = self.entries.get_mut(&module.id()).ok_or_else(not_registered)?;

        if entry.count > 1 {
            entry.count -= 1;
            return Ok(Released::Remaining(entry.count));
        }
        if entry.releasing {
            return Err(not_registered());
        }
        entry.releasing = true;
        Ok(Released::Last)
    }

    /// Complete a release that reported [`Released::Last`].
    ///
    /// Returns `true` if the entry was removed and the module must be
    /// deactivated.
    pub fn finish_release(&mut self, module: &Module) -> bool {
        let Some(entry) = self.entries.get_mut(&module.id()) else {
            return false;
        };
        entry.releasing = false;
        if entry.count > 1 {
            entry.count -= 1;
            return false;
        }
        self.entries.shift_remove(&module.id());
        true
    }

    /// Current reference count, 0 when absent.
    pub fn count(&self, module: &Module) -> usize {
        self.entries
            .get(&module.id())
            .map_or(0, |entry| entry.count)
    }

    /// Whether any active module is registered under `name`.
    pub fn has_name(&self, name: &str) -> bool {
        self.entries.values().any(|entry| entry.module.name() == name)
    }

    /// Whether any active module runs `watcher`.
    pub fn uses_watcher(&self, watcher: WatcherId) -> bool {
        self.entries
            .values()
            .any(|entry| entry.module.watcher().is_some_and(|w| w.id() == watcher))
    }

    /// `{name: reducer}` for all active modules. On a name collision the
    /// most recently registered module wins.
    pub fn active_reducers(&self) -> IndexMap<String, Reducer> {
        let mut reducers = IndexMap::with_capacity(self.entries.len());
        for entry in self.entries.values() {
            reducers.insert(entry.module.name().to_string(), entry.module.reducer().clone());
        }
        reducers
    }

    /// Active modules in first-acquisition order.
    pub fn modules(&self) -> Vec<Module> {
        self.entries.values().map(|entry| entry.module.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleConfig;
    use serde_json::json;

    fn module(name: &str) -> Module {
        ModuleConfig::new(name).build().unwrap()
    }

    #[test]
    fn first_acquire_activates() {
        let mut registry = ModuleRegistry::new();
        let m = module("a");

        assert_eq!(registry.acquire(&m), Acquired::First);
        assert_eq!(registry.acquire(&m), Acquired::Shared(2));
        assert_eq!(registry.count(&m), 2);
    }

    #[test]
    fn last_release_is_two_phase() {
        let mut registry = ModuleRegistry::new();
        let m = module("a");
        registry.acquire(&m);
        registry.acquire(&m);

        assert_eq!(registry.begin_release(&m), Ok(Released::Remaining(1)));
        assert_eq!(registry.begin_release(&m), Ok(Released::Last));
        // still active while the removal is in progress
        assert_eq!(registry.count(&m), 1);
        assert!(registry.has_name("a"));

        assert!(registry.finish_release(&m));
        assert_eq!(registry.count(&m), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn release_without_acquire_fails() {
        let mut registry = ModuleRegistry::new();
        let m = module("ghost");

        assert_eq!(
            registry.begin_release(&m),
            Err(StoreError::NotRegistered {
                name: "ghost".into()
            })
        );
    }

    #[test]
    fn double_release_during_removal_fails() {
        let mut registry = ModuleRegistry::new();
        let m = module("a");
        registry.acquire(&m);

        assert_eq!(registry.begin_release(&m), Ok(Released::Last));
        assert!(registry.begin_release(&m).is_err());
    }

    #[test]
    fn reacquire_during_removal_keeps_module() {
        let mut registry = ModuleRegistry::new();
        let m = module("a");
        registry.acquire(&m);

        assert_eq!(registry.begin_release(&m), Ok(Released::Last));
        assert_eq!(registry.acquire(&m), Acquired::Shared(2));

        assert!(!registry.finish_release(&m));
        assert_eq!(registry.count(&m), 1);

        assert_eq!(registry.begin_release(&m), Ok(Released::Last));
        assert!(registry.finish_release(&m));
    }

    #[test]
    fn last_registered_name_wins() {
        let mut registry = ModuleRegistry::new();
        let first = ModuleConfig::new("dup")
            .initial_state(json!(1))
            .build()
            .unwrap();
        let second = ModuleConfig::new("dup")
            .initial_state(json!(2))
            .build()
            .unwrap();
        registry.acquire(&first);
        registry.acquire(&second);

        let reducers = registry.active_reducers();
        assert_eq!(reducers.len(), 1);
        let winner = &reducers["dup"];
        assert_eq!(winner(None, &crate::store::Action::bare("x")), json!(2));
    }
}
