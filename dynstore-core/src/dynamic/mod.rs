//! Dynamic Module Layer
//!
//! [`create_dynamic_store`] builds a store whose effective reducer is derived
//! from the set of modules currently acquired into it.
//!
//! - [`ModuleRegistry`] holds the reference count per module identity.
//! - [`ReducerComposer`] turns the active set into one reducer.
//! - [`DynamicStore`] drives activation and deactivation and owns the watcher
//!   runtime.

mod composer;
mod registry;
mod store;

pub use composer::ReducerComposer;
pub use registry::{Acquired, ModuleRegistry, Released};
pub use store::{create_dynamic_store, DynamicStore, StoreConfig};
