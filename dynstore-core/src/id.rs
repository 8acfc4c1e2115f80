//! Identity tokens.
//!
//! Modules, watchers, tasks and store listeners are compared by identity,
//! never by structure. Each gets an opaque token minted from its own atomic
//! counter when it is created; clones of the owning value share the token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! identity_token {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Mint a fresh token.
            ///
            /// Uses an atomic counter to ensure uniqueness across threads.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw token value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

identity_token!(
    /// Identity of a [`Module`](crate::module::Module) descriptor.
    ModuleId,
    "module"
);

identity_token!(
    /// Identity of a [`Watcher`](crate::watcher::Watcher) process factory.
    ///
    /// Two modules holding clones of the same watcher share one running task.
    WatcherId,
    "watcher"
);

identity_token!(
    /// Identity of one running watcher task instance.
    TaskId,
    "task"
);

identity_token!(
    /// Identity of a store change listener.
    ListenerId,
    "listener"
);
