//! Dynstore Core
//!
//! This crate provides a centralized state container whose reducer is
//! assembled at runtime from self-contained feature modules. It implements:
//!
//! - A synchronous store with middleware and re-entrant dispatch
//! - Feature modules (reducer, action creators, selectors, watcher)
//! - Reference-counted module loading and unloading
//! - Cooperative watcher tasks that react to dispatched actions
//! - Scope-bound module usage
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: actions, reducers, middleware and the base store
//! - `watcher`: watcher processes and the task runtime that drives them
//! - `module`: module descriptors and their construction
//! - `dynamic`: the dynamic store, its registry and reducer composition
//! - `binding`: store providers and scoped module guards
//!
//! # Example
//!
//! ```rust,ignore
//! use dynstore_core::{create_dynamic_store, create_module, ModuleConfig, StoreConfig};
//! use dynstore_core::store::identity_reducer;
//! use serde_json::json;
//!
//! let store = create_dynamic_store(StoreConfig::new(identity_reducer()))?;
//!
//! let counter = create_module(
//!     ModuleConfig::new("counter")
//!         .initial_state(json!({ "value": 0 }))
//!         .reducer("increment", |state, _action| {
//!             state["value"] = json!(state["value"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .selector("value", |state| state["value"].clone()),
//! )?;
//!
//! let guard = store.bind(&counter);
//! store.dispatch(counter.actions()["increment"].empty());
//! assert_eq!(guard.select("value")?, json!(1));
//!
//! // Dropping the guard unloads the module and evicts its state.
//! drop(guard);
//! assert!(store.state().get("counter").is_none());
//! ```

pub mod binding;
pub mod dynamic;
pub mod error;
pub mod id;
pub mod module;
pub mod store;
pub mod watcher;

pub use binding::{use_dynamic_store, use_module, ModuleGuard, StoreProvider};
pub use dynamic::{create_dynamic_store, DynamicStore, StoreConfig};
pub use error::StoreError;
pub use module::{create_module, Module, ModuleConfig};
pub use store::{Action, ActionCreator, Store};
pub use watcher::{Pattern, Watcher, WatcherContext};
