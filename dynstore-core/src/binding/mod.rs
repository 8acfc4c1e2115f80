//! Scoped Binding
//!
//! Ties module lifetimes to scopes. A caller provides a store with
//! [`StoreProvider::enter`]; code inside the scope loads modules with
//! [`use_module`] and keeps them loaded for as long as the returned
//! [`ModuleGuard`] lives.

mod guard;
mod provider;

pub use guard::{use_module, ModuleGuard};
pub use provider::{use_dynamic_store, use_store, StoreHandle, StoreProvider};
