//! Watcher Context
//!
//! The handle a watcher process uses to talk to its store: wait for an
//! action, dispatch actions, read state.
//!
//! # Suspension
//!
//! [`WatcherContext::take`] is the only suspension point. It returns a
//! [`Take`] future that parks the task in its mailbox until the runtime
//! delivers a matching action. The runtime drives futures with a no-op waker,
//! so a watcher must not await anything else that would wait on an outside
//! wakeup: it would simply never resume.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::id::TaskId;
use crate::store::{Action, ActionCreator, WeakStore};

/// Which actions a [`Take`] accepts.
#[derive(Clone)]
pub enum Pattern {
    /// Every action.
    Any,

    /// Actions of one type.
    Kind(String),

    /// Actions of any of these types.
    OneOf(SmallVec<[String; 2]>),

    /// Actions accepted by a predicate.
    Predicate(Arc<dyn Fn(&Action) -> bool + Send + Sync>),
}

impl Pattern {
    /// Match any of the given action types.
    pub fn one_of<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(kinds.into_iter().map(Into::into).collect())
    }

    /// Match actions accepted by `f`.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Check an action against the pattern.
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => action.kind == *kind,
            Self::OneOf(kinds) => kinds.iter().any(|kind| action.kind == *kind),
            Self::Predicate(f) => f(action),
        }
    }
}

impl From<&str> for Pattern {
    fn from(kind: &str) -> Self {
        Self::Kind(kind.to_string())
    }
}

impl From<String> for Pattern {
    fn from(kind: String) -> Self {
        Self::Kind(kind)
    }
}

impl From<&ActionCreator> for Pattern {
    fn from(creator: &ActionCreator) -> Self {
        Self::Kind(creator.kind().to_string())
    }
}

impl From<ActionCreator> for Pattern {
    fn from(creator: ActionCreator) -> Self {
        Self::from(&creator)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::OneOf(kinds) => f.debug_tuple("OneOf").field(kinds).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Per-task slot the runtime delivers into.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    waiting: Option<Pattern>,
    delivered: Option<Action>,
}

impl Mailbox {
    /// Accept `action` if the task is parked on a matching pattern.
    pub(crate) fn offer(&mut self, action: &Action) -> bool {
        match &self.waiting {
            Some(pattern) if pattern.matches(action) => {
                self.waiting = None;
                self.delivered = Some(action.clone());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }
}

/// Future returned by [`WatcherContext::take`].
///
/// Resolves to the first matching action delivered after the task parks.
/// Dropping it unparks the task.
#[must_use = "a take does nothing unless awaited"]
pub struct Take {
    pattern: Pattern,
    mailbox: Arc<Mutex<Mailbox>>,
}

impl Future for Take {
    type Output = Action;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Action> {
        let mut mailbox = self.mailbox.lock();
        if let Some(action) = mailbox.delivered.take() {
            return Poll::Ready(action);
        }
        mailbox.waiting = Some(self.pattern.clone());
        Poll::Pending
    }
}

impl Drop for Take {
    fn drop(&mut self) {
        let mut mailbox = self.mailbox.lock();
        mailbox.waiting = None;
        mailbox.delivered = None;
    }
}

/// What a running watcher sees of the world.
#[derive(Clone)]
pub struct WatcherContext {
    task: TaskId,
    store: WeakStore,
    mailbox: Arc<Mutex<Mailbox>>,
}

impl WatcherContext {
    pub(crate) fn new(task: TaskId, store: WeakStore, mailbox: Arc<Mutex<Mailbox>>) -> Self {
        Self {
            task,
            store,
            mailbox,
        }
    }

    /// The task this context belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Suspend until an action matching `pattern` is dispatched.
    pub fn take(&self, pattern: impl Into<Pattern>) -> Take {
        Take {
            pattern: pattern.into(),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    /// Dispatch an action to the store.
    ///
    /// The reducer runs before this returns. Other watchers see the action
    /// once the current delivery has finished.
    pub fn dispatch(&self, action: Action) {
        match self.store.upgrade() {
            Some(store) => store.dispatch(action),
            None => tracing::warn!(task = %self.task, action = %action.kind, "store dropped; dispatch ignored"),
        }
    }

    /// Snapshot of the store state, if the store is still alive.
    pub fn state(&self) -> Option<Arc<Value>> {
        self.store.upgrade().map(|store| store.state())
    }

    /// Read the store state through a function.
    pub fn select<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Value) -> R,
    {
        self.state().map(|state| f(&state))
    }
}

impl fmt::Debug for WatcherContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherContext")
            .field("task", &self.task)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::task::noop_waker_ref;

    #[test]
    fn patterns_match_types() {
        let ping = Action::bare("ping");
        assert!(Pattern::Any.matches(&ping));
        assert!(Pattern::from("ping").matches(&ping));
        assert!(!Pattern::from("pong").matches(&ping));
        assert!(Pattern::one_of(["pong", "ping"]).matches(&ping));
        assert!(Pattern::predicate(|a| a.kind.starts_with("pi")).matches(&ping));
    }

    #[test]
    fn mailbox_only_accepts_while_waiting() {
        let mut mailbox = Mailbox::default();
        assert!(!mailbox.offer(&Action::bare("ping")));

        mailbox.waiting = Some(Pattern::from("ping"));
        assert!(!mailbox.offer(&Action::bare("pong")));
        assert!(mailbox.offer(&Action::bare("ping")));
        assert!(!mailbox.is_waiting());
    }

    #[test]
    fn take_parks_then_resolves() {
        let mailbox = Arc::new(Mutex::new(Mailbox::default()));
        let ctx = WatcherContext::new(TaskId::new(), WeakStore::detached(), mailbox.clone());
        let mut take = ctx.take("ping");
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(Pin::new(&mut take).poll(&mut cx).is_pending());
        assert!(mailbox.lock().is_waiting());

        assert!(mailbox.lock().offer(&Action::new("ping", 1)));
        match Pin::new(&mut take).poll(&mut cx) {
            Poll::Ready(action) => assert_eq!(action, Action::new("ping", 1)),
            Poll::Pending => panic!("take should resolve after delivery"),
        }
    }

    #[test]
    fn dropping_take_unparks() {
        let mailbox = Arc::new(Mutex::new(Mailbox::default()));
        let ctx = WatcherContext::new(TaskId::new(), WeakStore::detached(), mailbox.clone());
        let mut take = ctx.take("ping");
        let mut cx = Context::from_waker(noop_waker_ref());
        let _ = Pin::new(&mut take).poll(&mut cx);

        drop(take);
        assert!(!mailbox.lock().is_waiting());
        assert!(ctx.state().is_none());
    }
}
