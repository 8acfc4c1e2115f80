//! Store errors.
//!
//! Every failure in this crate is a contract violation by the integrating
//! code, reported synchronously at the call site. Nothing is retried.
//!
//! | Error | Code | Kind |
//! |-------|------|------|
//! | [`StoreError::InvalidReducer`] | `STORE_INVALID_REDUCER` | configuration |
//! | [`StoreError::MissingModule`] | `STORE_MISSING_MODULE` | configuration |
//! | [`StoreError::EmptyModuleName`] | `STORE_EMPTY_MODULE_NAME` | configuration |
//! | [`StoreError::NotDynamic`] | `STORE_NOT_DYNAMIC` | context |
//! | [`StoreError::NoStoreInContext`] | `STORE_NO_CONTEXT` | context |
//! | [`StoreError::NotRegistered`] | `STORE_NOT_REGISTERED` | usage |
//! | [`StoreError::UnknownSelector`] | `STORE_UNKNOWN_SELECTOR` | usage |
//! | [`StoreError::ModuleNotLoaded`] | `STORE_MODULE_NOT_LOADED` | usage |

use thiserror::Error;

/// Errors raised by the store, the module registry and the lifecycle binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store was configured without a usable reducer.
    #[error("\"reducer\" is a required argument, and must be a function or an object of functions that can be passed to combineReducers")]
    InvalidReducer,

    /// The lifecycle binding was called without a module.
    #[error("Expected parameter `dynamicModule` of `useModule` to be provided")]
    MissingModule,

    /// A module was declared with an empty name.
    #[error("module name must be a non-empty string")]
    EmptyModuleName,

    /// The store in context cannot register modules.
    #[error("Expected dynamic store to be in context. Did you forget to replace `createStore` with `createDynamicStore`?")]
    NotDynamic,

    /// No store has been provided to the current thread.
    #[error("no store in context; wrap the caller in `StoreProvider::enter`")]
    NoStoreInContext,

    /// `release` was called for a module without an active registration.
    #[error("module `{name}` released without a matching acquire")]
    NotRegistered { name: String },

    /// The module has no selector under this key.
    #[error("module `{module}` has no selector named `{key}`")]
    UnknownSelector { module: String, key: String },

    /// The module's subtree is not present in the state.
    #[error("module `{name}` is not loaded into the store")]
    ModuleNotLoaded { name: String },
}

impl StoreError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReducer => "STORE_INVALID_REDUCER",
            Self::MissingModule => "STORE_MISSING_MODULE",
            Self::EmptyModuleName => "STORE_EMPTY_MODULE_NAME",
            Self::NotDynamic => "STORE_NOT_DYNAMIC",
            Self::NoStoreInContext => "STORE_NO_CONTEXT",
            Self::NotRegistered { .. } => "STORE_NOT_REGISTERED",
            Self::UnknownSelector { .. } => "STORE_UNKNOWN_SELECTOR",
            Self::ModuleNotLoaded { .. } => "STORE_MODULE_NOT_LOADED",
        }
    }

    /// Whether the error comes from the provider context rather than from
    /// the module or the state.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::NotDynamic | Self::NoStoreInContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reducer_message_is_stable() {
        assert_eq!(
            StoreError::InvalidReducer.to_string(),
            "\"reducer\" is a required argument, and must be a function or an object of functions that can be passed to combineReducers"
        );
    }

    #[test]
    fn context_errors_are_distinguishable() {
        assert!(StoreError::NotDynamic.is_context_error());
        assert!(!StoreError::ModuleNotLoaded { name: "a".into() }.is_context_error());
        assert_eq!(StoreError::NotDynamic.code(), "STORE_NOT_DYNAMIC");
    }
}
