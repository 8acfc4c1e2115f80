//! Watcher processes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use super::context::{Pattern, WatcherContext};
use crate::id::WatcherId;
use crate::store::Action;

type Process = Arc<dyn Fn(WatcherContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// A factory for a long-running watcher process.
///
/// The process is an `async` body that usually loops forever: wait for an
/// action with [`WatcherContext::take`], react, dispatch follow-ups, repeat.
/// It runs until it returns or until its task is cancelled.
///
/// Identity is fixed at construction. Clones share the identity, so modules
/// holding clones of one watcher share a single running task.
///
/// # Example
///
/// ```rust,ignore
/// let watcher = Watcher::new(|ctx| async move {
///     loop {
///         ctx.take("boom").await;
///         ctx.dispatch(Action::bare("counter/increment"));
///     }
/// });
/// ```
#[derive(Clone)]
pub struct Watcher {
    id: WatcherId,
    process: Process,
}

impl Watcher {
    /// Create a watcher from an async process factory.
    pub fn new<F, Fut>(process: F) -> Self
    where
        F: Fn(WatcherContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            id: WatcherId::new(),
            process: Arc::new(move |ctx| process(ctx).boxed()),
        }
    }

    /// A watcher that calls `handler` for every action matching `pattern`.
    pub fn take_every<P, F>(pattern: P, handler: F) -> Self
    where
        P: Into<Pattern>,
        F: Fn(&WatcherContext, Action) + Send + Sync + 'static,
    {
        let pattern = pattern.into();
        let handler = Arc::new(handler);
        Self::new(move |ctx| {
            let pattern = pattern.clone();
            let handler = Arc::clone(&handler);
            async move {
                loop {
                    let action = ctx.take(pattern.clone()).await;
                    handler(&ctx, action);
                }
            }
        })
    }

    /// The watcher's identity.
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Create a fresh instance of the process.
    pub(crate) fn instantiate(&self, ctx: WatcherContext) -> BoxFuture<'static, ()> {
        (self.process)(ctx)
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher").field("id", &self.id).finish()
    }
}
