//! Actions and the lifecycle notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dispatched once when a store is created.
pub const STORE_INIT: &str = "@@store/INIT";

/// Dispatched after every reducer replacement.
pub const STORE_REPLACE: &str = "@@store/REPLACE";

/// Dispatched when a module becomes active. Payload: the module name.
pub const MODULE_ADDED: &str = "@@MODULE/ADDED";

/// Dispatched when a module is about to become fully inactive.
/// Payload: the module name.
pub const MODULE_REMOVED: &str = "@@MODULE/REMOVED";

/// A plain action: a type tag plus an arbitrary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The action type.
    #[serde(rename = "type")]
    pub kind: String,

    /// The payload, `Null` when absent.
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Create an action with a payload.
    pub fn new(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// Create an action without a payload.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Check the action type.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// The payload as a string, if it is one.
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

/// Build the "module added" notification.
pub fn module_added(name: &str) -> Action {
    Action::new(MODULE_ADDED, name)
}

/// Build the "module removed" notification.
pub fn module_removed(name: &str) -> Action {
    Action::new(MODULE_REMOVED, name)
}

/// Creates actions of one fixed type.
///
/// Modules generate one creator per case reducer, typed `"{module}/{key}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionCreator {
    kind: String,
}

impl ActionCreator {
    /// Create a creator for the given action type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// The action type this creator produces.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Create an action carrying `payload`.
    pub fn create(&self, payload: impl Into<Value>) -> Action {
        Action::new(self.kind.clone(), payload)
    }

    /// Create an action without a payload.
    pub fn empty(&self) -> Action {
        Action::bare(self.kind.clone())
    }

    /// Whether `action` was produced by this creator.
    pub fn matches(&self, action: &Action) -> bool {
        action.kind == self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notifications_carry_module_name() {
        let added = module_added("todos");
        assert!(added.is(MODULE_ADDED));
        assert_eq!(added.payload_str(), Some("todos"));

        let removed = module_removed("todos");
        assert!(removed.is(MODULE_REMOVED));
        assert_eq!(removed.payload, json!("todos"));
    }

    #[test]
    fn action_uses_type_field_on_the_wire() {
        let action = Action::new("counter/add", 2);
        let encoded = serde_json::to_value(&action).unwrap();
        assert_eq!(encoded, json!({ "type": "counter/add", "payload": 2 }));

        let decoded: Action = serde_json::from_value(json!({ "type": "ping" })).unwrap();
        assert_eq!(decoded, Action::bare("ping"));
    }

    #[test]
    fn creator_matches_its_own_actions() {
        let increment = ActionCreator::new("counter/increment");
        assert!(increment.matches(&increment.empty()));
        assert!(!increment.matches(&Action::bare("counter/decrement")));
        assert_eq!(increment.create(3).payload, json!(3));
    }
}
