//! Modules
//!
//! A module bundles everything one feature contributes to the store: a
//! reducer for its own subtree, generated action creators, selectors scoped
//! to its subtree and, optionally, a watcher process.
//!
//! Modules are built once with [`create_module`] and never change. They can
//! be acquired into and released from any number of dynamic stores, any
//! number of times.

mod config;
mod module;
mod selector;

pub use config::{create_module, CaseReducer, ModuleConfig};
pub use module::{ActionCreators, Module};
pub use selector::Selector;
