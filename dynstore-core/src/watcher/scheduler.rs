//! Watcher Scheduler
//!
//! Keeps at most one running task per watcher identity.
//!
//! Starting a watcher that already has a live task is a no-op, so modules
//! sharing a watcher share its task. Stopping requests cancellation of the
//! recorded task and forgets it; stopping an unknown watcher is a no-op.

use dashmap::DashMap;

use super::runtime::{Task, TaskRuntime};
use super::watcher::Watcher;
use crate::id::WatcherId;

/// Deduplicating front end to a [`TaskRuntime`].
pub struct WatcherScheduler {
    runtime: TaskRuntime,

    /// Live task per watcher identity.
    running: DashMap<WatcherId, Task>,
}

impl WatcherScheduler {
    /// Create a scheduler spawning onto `runtime`.
    pub fn new(runtime: TaskRuntime) -> Self {
        Self {
            runtime,
            running: DashMap::new(),
        }
    }

    /// The runtime tasks are spawned on.
    pub fn runtime(&self) -> &TaskRuntime {
        &self.runtime
    }

    /// Start `watcher` unless it already has a live task.
    ///
    /// Returns `true` if a task was started. The task is recorded before its
    /// first poll, so a watcher that re-enters `start` for itself is ignored.
    pub fn start(&self, watcher: &Watcher) -> bool {
        let id = watcher.id();
        let live = self.running.get(&id).is_some_and(|task| task.is_running());
        if live {
            tracing::trace!(watcher = %id, "watcher already running");
            return false;
        }

        let task = self.runtime.spawn(watcher);
        let task_id = task.id();
        self.running.insert(id, task);
        self.runtime.poll(task_id);

        tracing::debug!(watcher = %id, task = %task_id, "watcher started");
        true
    }

    /// Cancel the live task of `watcher`, if any.
    ///
    /// Returns `true` if a task was recorded.
    pub fn stop(&self, watcher: &Watcher) -> bool {
        let id = watcher.id();
        match self.running.remove(&id) {
            Some((_, task)) => {
                task.cancel();
                tracing::debug!(watcher = %id, task = %task.id(), "watcher stopped");
                true
            }
            None => false,
        }
    }

    /// Whether `watcher` currently has a live task.
    pub fn is_running(&self, watcher: WatcherId) -> bool {
        self.running
            .get(&watcher)
            .is_some_and(|task| task.is_running())
    }

    /// Number of watchers with a recorded task.
    pub fn watcher_count(&self) -> usize {
        self.running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn counting_watcher(starts: Arc<AtomicI32>) -> Watcher {
        Watcher::new(move |ctx| {
            let starts = starts.clone();
            async move {
                starts.fetch_add(1, Ordering::SeqCst);
                loop {
                    ctx.take("never").await;
                }
            }
        })
    }

    #[test]
    fn start_is_idempotent() {
        let scheduler = WatcherScheduler::new(TaskRuntime::new());
        let starts = Arc::new(AtomicI32::new(0));
        let watcher = counting_watcher(starts.clone());

        assert!(scheduler.start(&watcher));
        assert!(!scheduler.start(&watcher));
        assert!(!scheduler.start(&watcher.clone()));

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.runtime().task_count(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let scheduler = WatcherScheduler::new(TaskRuntime::new());
        let watcher = counting_watcher(Arc::new(AtomicI32::new(0)));

        scheduler.start(&watcher);
        assert!(scheduler.is_running(watcher.id()));

        assert!(scheduler.stop(&watcher));
        assert!(!scheduler.stop(&watcher));
        assert!(!scheduler.is_running(watcher.id()));
        assert_eq!(scheduler.runtime().task_count(), 0);
    }

    #[test]
    fn restart_after_stop_spawns_new_task() {
        let scheduler = WatcherScheduler::new(TaskRuntime::new());
        let starts = Arc::new(AtomicI32::new(0));
        let watcher = counting_watcher(starts.clone());

        scheduler.start(&watcher);
        scheduler.stop(&watcher);
        scheduler.start(&watcher);

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.watcher_count(), 1);
    }

    #[test]
    fn finished_watcher_can_start_again() {
        let scheduler = WatcherScheduler::new(TaskRuntime::new());
        let watcher = Watcher::new(|_ctx| async {});

        assert!(scheduler.start(&watcher));
        assert!(!scheduler.is_running(watcher.id()));
        assert!(scheduler.start(&watcher));
    }
}
