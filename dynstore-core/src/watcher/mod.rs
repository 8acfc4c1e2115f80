//! Watcher Processes
//!
//! Watchers are long-running cooperative processes that react to dispatched
//! actions. They are written as ordinary `async` blocks and driven by a
//! [`TaskRuntime`] on the dispatching thread; no executor and no OS threads
//! are involved.
//!
//! # Concepts
//!
//! ## Watcher
//!
//! A [`Watcher`] is a factory for a process. Each start creates a fresh
//! instance. Its identity decides deduplication: clones of one watcher run
//! as a single task under a [`WatcherScheduler`].
//!
//! ## Context
//!
//! A running process receives a [`WatcherContext`]. `take(pattern).await`
//! suspends until a matching action is dispatched; `dispatch` and `select`
//! run synchronously.
//!
//! ## Cancellation
//!
//! Cancelling a task drops its future at whatever `take` it is parked on.
//! Anything the process owns is dropped with it and it never resumes.

mod context;
mod runtime;
mod scheduler;
mod watcher;

pub use context::{Pattern, Take, WatcherContext};
pub use runtime::{Task, TaskRuntime};
pub use scheduler::WatcherScheduler;
pub use watcher::Watcher;
