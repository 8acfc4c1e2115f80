//! Task Runtime
//!
//! Runs watcher processes as cooperative tasks on the dispatching thread.
//!
//! # How It Works
//!
//! 1. Spawning a watcher creates a task slot holding its boxed future and a
//!    mailbox. Running it polls the future until it parks on its first
//!    `take`.
//!
//! 2. The runtime sits in the store's middleware chain. Every action is
//!    reduced first, then queued for delivery.
//!
//! 3. Draining the queue delivers each action to every task parked on a
//!    matching pattern and polls those tasks until they park again. Actions
//!    the tasks dispatch meanwhile are reduced immediately and queued behind
//!    the current one, so every task sees actions in dispatch order.
//!
//!    A task only receives actions queued after it was spawned. A task
//!    started during a drain never sees deliveries that were already
//!    pending, even when an earlier instance of the same watcher consumed
//!    them.
//!
//! 4. Cancellation is queued the same way. When it is processed the task's
//!    future is dropped, which releases everything it holds. A task that is
//!    being polled when its cancellation is processed is dropped as soon as
//!    the poll returns and is never polled again.
//!
//! 5. Deferred jobs run in queue order too, which lets the store finish a
//!    transition only after the notifications queued before it went out.
//!
//! Only the outermost caller drains; nested callers enqueue and return.
//! No lock is held while a task runs.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::task::noop_waker_ref;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::context::{Mailbox, WatcherContext};
use super::watcher::Watcher;
use crate::id::{TaskId, WatcherId};
use crate::store::{Action, Middleware, Next, Store, WeakStore};

struct TaskSlot {
    watcher: WatcherId,
    /// Delivery sequence number at spawn time.
    born: u64,
    /// `None` while the task is being polled.
    future: Option<BoxFuture<'static, ()>>,
    mailbox: Arc<Mutex<Mailbox>>,
    cancelled: bool,
}

type Deferred = Box<dyn FnOnce() + Send>;

enum Job {
    Deliver { seq: u64, action: Action },
    Cancel(TaskId),
    Run(Deferred),
}

struct RuntimeInner {
    store: RwLock<WeakStore>,
    tasks: Mutex<IndexMap<TaskId, TaskSlot>>,
    jobs: Mutex<VecDeque<Job>>,
    /// Next delivery sequence number.
    sequence: AtomicU64,
    draining: AtomicBool,
}

/// Clears the draining flag even if a task panics.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cooperative runtime for watcher tasks.
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct TaskRuntime {
    inner: Arc<RuntimeInner>,
}

impl TaskRuntime {
    /// Create an unbound runtime. Tasks spawned before [`bind`](Self::bind)
    /// see no store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                store: RwLock::new(WeakStore::detached()),
                tasks: Mutex::new(IndexMap::new()),
                jobs: Mutex::new(VecDeque::new()),
                sequence: AtomicU64::new(0),
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Attach the store tasks dispatch to and read from.
    pub fn bind(&self, store: &Store) {
        *self.inner.store.write() = store.downgrade();
    }

    /// Spawn a task for `watcher` and run it to its first suspension point.
    pub fn run(&self, watcher: &Watcher) -> Task {
        let task = self.spawn(watcher);
        self.poll(task.id);
        task
    }

    /// Register a task without polling it.
    pub(crate) fn spawn(&self, watcher: &Watcher) -> Task {
        let id = TaskId::new();
        let mailbox = Arc::new(Mutex::new(Mailbox::default()));
        let store = self.inner.store.read().clone();
        let future = watcher.instantiate(WatcherContext::new(id, store, Arc::clone(&mailbox)));
        let born = self.inner.sequence.load(Ordering::SeqCst);

        self.inner.tasks.lock().insert(
            id,
            TaskSlot {
                watcher: watcher.id(),
                born,
                future: Some(future),
                mailbox,
                cancelled: false,
            },
        );
        tracing::debug!(task = %id, watcher = %watcher.id(), "task spawned");

        Task {
            id,
            watcher: watcher.id(),
            runtime: Arc::downgrade(&self.inner),
        }
    }

    /// Queue `action` for delivery to parked tasks.
    pub fn put(&self, action: Action) {
        {
            let mut jobs = self.inner.jobs.lock();
            let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
            jobs.push_back(Job::Deliver { seq, action });
        }
        self.drain();
    }

    /// Queue `job` to run after everything already queued.
    pub(crate) fn defer<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.jobs.lock().push_back(Job::Run(Box::new(job)));
        self.drain();
    }

    /// Queue cancellation of a task.
    pub fn cancel(&self, id: TaskId) {
        self.inner.jobs.lock().push_back(Job::Cancel(id));
        self.drain();
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .values()
            .filter(|slot| !slot.cancelled)
            .count()
    }

    /// Whether the task is alive and not cancelled.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.inner
            .tasks
            .lock()
            .get(&id)
            .is_some_and(|slot| !slot.cancelled)
    }

    fn drain(&self) {
        loop {
            if self.inner.draining.swap(true, Ordering::SeqCst) {
                return;
            }
            {
                let _draining = DrainGuard(&self.inner.draining);
                loop {
                    let job = self.inner.jobs.lock().pop_front();
                    match job {
                        Some(Job::Deliver { seq, action }) => self.deliver(seq, &action),
                        Some(Job::Cancel(id)) => self.cancel_now(id),
                        Some(Job::Run(job)) => job(),
                        None => break,
                    }
                }
            }
            // a job pushed by another thread between the last pop and the
            // flag reset would otherwise wait for the next caller
            if self.inner.jobs.lock().is_empty() {
                return;
            }
        }
    }

    /// Hand `action` to every parked task that accepts it and existed when
    /// it was queued, then resume them in spawn order.
    fn deliver(&self, seq: u64, action: &Action) {
        let accepted: Vec<TaskId> = self
            .inner
            .tasks
            .lock()
            .iter()
            .filter(|(_, slot)| {
                !slot.cancelled && slot.born <= seq && slot.mailbox.lock().offer(action)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in accepted {
            self.poll(id);
        }
    }

    /// Poll a task once. Finished and cancelled tasks are removed and their
    /// futures dropped outside the lock.
    pub(crate) fn poll(&self, id: TaskId) {
        let mut future = {
            let mut tasks = self.inner.tasks.lock();
            match tasks.get_mut(&id) {
                Some(slot) if !slot.cancelled => match slot.future.take() {
                    Some(future) => future,
                    // already being polled further up the stack
                    None => return,
                },
                _ => return,
            }
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        let outcome = future.as_mut().poll(&mut cx);

        let removed = {
            let mut tasks = self.inner.tasks.lock();
            let keep = outcome.is_pending() && tasks.get(&id).is_some_and(|slot| !slot.cancelled);
            if keep {
                if let Some(slot) = tasks.get_mut(&id) {
                    slot.future = Some(future);
                }
                None
            } else {
                tasks.shift_remove(&id);
                Some(future)
            }
        };

        if let Some(future) = removed {
            drop(future);
            match outcome {
                Poll::Ready(()) => tracing::debug!(task = %id, "task finished"),
                Poll::Pending => tracing::debug!(task = %id, "task cancelled"),
            }
        }
    }

    fn cancel_now(&self, id: TaskId) {
        let removed = {
            let mut tasks = self.inner.tasks.lock();
            let in_flight = match tasks.get_mut(&id) {
                Some(slot) => {
                    slot.cancelled = true;
                    slot.future.is_none()
                }
                None => return,
            };
            if in_flight {
                None
            } else {
                tasks.shift_remove(&id)
            }
        };

        if let Some(slot) = removed {
            tracing::debug!(task = %id, watcher = %slot.watcher, "task cancelled");
            drop(slot);
        }
    }
}

impl Default for TaskRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for TaskRuntime {
    fn handle(&self, _store: &Store, action: Action, next: Next<'_>) {
        next.run(action.clone());
        self.put(action);
    }
}

impl fmt::Debug for TaskRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRuntime")
            .field("task_count", &self.task_count())
            .field("queued", &self.inner.jobs.lock().len())
            .finish()
    }
}

/// Handle to a spawned task.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    watcher: WatcherId,
    runtime: Weak<RuntimeInner>,
}

impl Task {
    /// The task's identity.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The watcher this task runs.
    pub fn watcher(&self) -> WatcherId {
        self.watcher
    }

    /// Whether the task is alive and not cancelled.
    pub fn is_running(&self) -> bool {
        self.runtime()
            .is_some_and(|runtime| runtime.is_running(self.id))
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        if let Some(runtime) = self.runtime() {
            runtime.cancel(self.id);
        }
    }

    fn runtime(&self) -> Option<TaskRuntime> {
        self.runtime.upgrade().map(|inner| TaskRuntime { inner })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("watcher", &self.watcher)
            .field("running", &self.is_running())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
