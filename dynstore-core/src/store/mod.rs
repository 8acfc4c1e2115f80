//! State Container
//!
//! The minimal store the dynamic module layer runs on: actions, reducers,
//! reducer composition, middleware and the store itself.
//!
//! # Concepts
//!
//! ## Actions
//!
//! An [`Action`] is a type tag with a JSON payload. Two of them,
//! [`MODULE_ADDED`] and [`MODULE_REMOVED`], are lifecycle notifications that
//! reducers and watchers may react to like any other action.
//!
//! ## Reducers
//!
//! A [`Reducer`] maps the previous state (or `None` before initialization) and
//! an action to the next state. Reducers are pure and cheap to clone; the
//! store swaps them atomically.
//!
//! ## Middleware
//!
//! A [`Middleware`] sees every dispatched action before the reducer does. The
//! watcher runtime is installed as middleware on dynamic stores.

mod action;
mod middleware;
mod reducer;
mod store;

pub use action::{
    module_added, module_removed, Action, ActionCreator, MODULE_ADDED, MODULE_REMOVED,
    STORE_INIT, STORE_REPLACE,
};
pub use middleware::{default_middleware, Middleware, MiddlewareConfig, Next, TraceActions};
pub use reducer::{combine_reducers, identity_reducer, reducer, Reducer, ReducerConfig};
pub use store::{Store, StoreOptions, Subscription, WeakStore};
