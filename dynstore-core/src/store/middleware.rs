//! Dispatch middleware.
//!
//! Middleware wraps the store's base dispatch. Each link receives the action
//! and a [`Next`] handle for the rest of the chain; calling [`Next::run`]
//! passes the action on, and the end of the chain applies the reducer.

use std::fmt;
use std::sync::Arc;

use super::action::Action;
use super::store::Store;

/// A link in the dispatch chain.
pub trait Middleware: Send + Sync {
    /// Handle `action`. Call `next.run(..)` to forward it.
    fn handle(&self, store: &Store, action: Action, next: Next<'_>);
}

impl<F> Middleware for F
where
    F: for<'a> Fn(&Store, Action, Next<'a>) + Send + Sync,
{
    fn handle(&self, store: &Store, action: Action, next: Next<'_>) {
        self(store, action, next)
    }
}

/// The remainder of a dispatch chain.
pub struct Next<'a> {
    store: &'a Store,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(store: &'a Store, rest: &'a [Arc<dyn Middleware>]) -> Self {
        Self { store, rest }
    }

    /// Forward the action to the next link, or to the reducer.
    pub fn run(self, action: Action) {
        match self.rest.split_first() {
            Some((head, tail)) => head.handle(self.store, action, Next::new(self.store, tail)),
            None => self.store.reduce(action),
        }
    }
}

/// Logs every action passing through at `trace` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceActions;

impl Middleware for TraceActions {
    fn handle(&self, _store: &Store, action: Action, next: Next<'_>) {
        tracing::trace!(action = %action.kind, "dispatch");
        next.run(action);
    }
}

/// The middleware installed when the store configuration asks for none.
pub fn default_middleware() -> Vec<Arc<dyn Middleware>> {
    vec![Arc::new(TraceActions)]
}

type ExtendFn = Box<dyn FnOnce(Vec<Arc<dyn Middleware>>) -> Vec<Arc<dyn Middleware>> + Send>;

/// How a store's middleware list is assembled.
#[derive(Default)]
pub enum MiddlewareConfig {
    /// Use [`default_middleware`].
    #[default]
    Default,

    /// Use exactly this list instead of the defaults.
    Replace(Vec<Arc<dyn Middleware>>),

    /// Derive the list from the defaults.
    Extend(ExtendFn),
}

impl MiddlewareConfig {
    /// Build an [`MiddlewareConfig::Extend`] from a closure.
    pub fn extend<F>(f: F) -> Self
    where
        F: FnOnce(Vec<Arc<dyn Middleware>>) -> Vec<Arc<dyn Middleware>> + Send + 'static,
    {
        Self::Extend(Box::new(f))
    }

    /// Resolve the final list.
    pub fn resolve(self) -> Vec<Arc<dyn Middleware>> {
        match self {
            Self::Default => default_middleware(),
            Self::Replace(list) => list,
            Self::Extend(f) => f(default_middleware()),
        }
    }
}

impl fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Replace(list) => write!(f, "Replace({} middleware)", list.len()),
            Self::Extend(_) => f.write_str("Extend(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::reducer::identity_reducer;
    use crate::store::StoreOptions;
    use parking_lot::Mutex;

    fn recorder(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(move |_store: &Store, action: Action, next: Next<'_>| {
            log.lock().push(format!("{tag}:{}", action.kind));
            next.run(action);
        })
    }

    #[test]
    fn chain_runs_in_order_before_reducer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let options = StoreOptions {
            middleware: MiddlewareConfig::Replace(vec![
                recorder("first", log.clone()),
                recorder("second", log.clone()),
            ]),
            ..StoreOptions::default()
        };
        let store = Store::with_options(identity_reducer(), options);

        store.dispatch(Action::bare("ping"));

        assert_eq!(*log.lock(), vec!["first:ping", "second:ping"]);
    }

    #[test]
    fn middleware_can_swallow_actions() {
        let swallow: Arc<dyn Middleware> =
            Arc::new(|_store: &Store, _action: Action, _next: Next<'_>| {});
        let options = StoreOptions {
            middleware: MiddlewareConfig::Replace(vec![swallow]),
            ..StoreOptions::default()
        };
        let store = Store::with_options(
            crate::store::reducer(|state, action| {
                let n = state.and_then(|s| s.as_i64()).unwrap_or(0);
                serde_json::json!(if action.is("inc") { n + 1 } else { n })
            }),
            options,
        );

        store.dispatch(Action::bare("inc"));
        assert_eq!(*store.state(), serde_json::json!(0));
    }

    #[test]
    fn extend_receives_defaults() {
        let list = MiddlewareConfig::extend(|mut defaults| {
            defaults.push(Arc::new(TraceActions));
            defaults
        })
        .resolve();
        assert_eq!(list.len(), 2);
    }
}
