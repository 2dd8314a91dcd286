use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;

use crate::error::{Error, PropertyKind, Result};
use crate::state::definition::{Action, Actions, Getters, State, StateContext};
use crate::state::Slice;

const BUILTINS: [&str; 3] = ["state", "namespace", "definition"];

/// A resolved property of a [`StateUnit`].
#[derive(Clone)]
pub enum Property {
    /// Value of a getter, computed just now.
    Getter(Value),
    /// An action, ready to call.
    Action(Action),
    /// A field of the current slice.
    Field(Value),
    /// An own member of the unit.
    Member(Value),
    /// A built-in member (`state`, `namespace` or `definition`).
    Builtin(Value),
}

impl Property {
    /// Which layer the property came from.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Getter(_) => PropertyKind::Getter,
            Property::Action(_) => PropertyKind::Action,
            Property::Field(_) => PropertyKind::Field,
            Property::Member(_) => PropertyKind::Member,
            Property::Builtin(_) => PropertyKind::Builtin,
        }
    }

    /// The property as a plain value. Actions have none.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Property::Getter(v) | Property::Field(v) | Property::Member(v) | Property::Builtin(v) => Some(v),
            Property::Action(_) => None,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Getter(v) => f.debug_tuple("Getter").field(v).finish(),
            Property::Action(_) => f.write_str("Action(..)"),
            Property::Field(v) => f.debug_tuple("Field").field(v).finish(),
            Property::Member(v) => f.debug_tuple("Member").field(v).finish(),
            Property::Builtin(v) => f.debug_tuple("Builtin").field(v).finish(),
        }
    }
}

/// One registered namespace: its behaviour plus a read facade over
/// getters, actions, slice fields and own members.
///
/// Names resolve in a fixed order: getters, then actions, then fields of
/// the current slice, then own members, then the built-ins `state`,
/// `namespace` and `definition`. The first layer that knows a name wins.
///
/// Only own members may be assigned or deleted. Any other name is rejected
/// with [`Error::IllegalMutation`]; slices change through
/// [`Store::dispatch`](crate::Store::dispatch) alone.
pub struct StateUnit {
    context: StateContext,
    behavior: Box<dyn State>,
    getters: Getters,
    actions: Actions,
    members: RwLock<IndexMap<String, Value>>,
}

impl StateUnit {
    pub(crate) fn new(context: StateContext, behavior: Box<dyn State>) -> Self {
        let getters = behavior.getters();
        let actions = behavior.actions();
        let members = behavior.members();
        Self {
            context,
            behavior,
            getters,
            actions,
            members: RwLock::new(members),
        }
    }

    /// Namespace this unit governs.
    pub fn namespace(&self) -> &str {
        self.context.namespace()
    }

    /// Definition passed at registration.
    pub fn definition(&self) -> &Value {
        self.context.definition()
    }

    /// Slice used while the store has no entry for this namespace.
    pub fn default_slice(&self) -> Slice {
        self.behavior.default_slice()
    }

    /// The live slice: the store's entry, or the default slice.
    ///
    /// Re-read from the store on every call.
    pub fn current_slice(&self) -> Slice {
        self.context
            .store_ref()
            .upgrade()
            .and_then(|store| store.slice(self.namespace()))
            .unwrap_or_else(|| self.default_slice())
    }

    /// Run the reducer.
    pub fn reduce(&self, prior: &Slice, payload: &Value) -> Slice {
        self.behavior.reduce(prior, payload)
    }

    /// Evaluate a getter against the current slice.
    pub fn getter(&self, name: &str) -> Option<Value> {
        self.getters.get(name).map(|g| g(&self.current_slice()))
    }

    /// Look up an action by name.
    pub fn action(&self, name: &str) -> Option<Action> {
        self.actions.get(name).cloned()
    }

    /// Call an action.
    ///
    /// Whatever the action returns, including errors, is handed back
    /// unchanged.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Some(Property::Action(action)) => action(args),
            Some(_) => Err(Error::NotAnAction {
                namespace: self.namespace().to_string(),
                name: name.to_string(),
            }),
            None => Err(Error::UnknownProperty {
                namespace: self.namespace().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a name through all layers.
    pub fn get(&self, name: &str) -> Option<Property> {
        if let Some(value) = self.getter(name) {
            return Some(Property::Getter(value));
        }
        if let Some(action) = self.action(name) {
            return Some(Property::Action(action));
        }
        let slice = self.current_slice();
        if let Some(value) = slice.field(name) {
            return Some(Property::Field(value.clone()));
        }
        if let Some(value) = self.members.read().get(name) {
            return Some(Property::Member(value.clone()));
        }
        match name {
            "state" => Some(Property::Builtin(slice.value().clone())),
            "namespace" => Some(Property::Builtin(Value::String(self.namespace().to_string()))),
            "definition" => Some(Property::Builtin(self.definition().clone())),
            _ => None,
        }
    }

    /// Whether any layer knows the name.
    pub fn has(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Assign an own member.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        self.guard(name)?;
        tracing::trace!(namespace = %self.namespace(), member = name, "set member");
        self.members.write().insert(name.to_string(), value);
        Ok(())
    }

    /// Remove an own member, returning its value.
    pub fn delete(&self, name: &str) -> Result<Option<Value>> {
        self.guard(name)?;
        Ok(self.members.write().shift_remove(name))
    }

    /// Every known name, in resolution order, without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let slice = self.current_slice();
        let members = self.members.read();
        let mut keys: Vec<String> = Vec::new();
        let names = self
            .getters
            .keys()
            .map(String::as_str)
            .chain(self.actions.keys().map(String::as_str))
            .chain(slice.field_names())
            .chain(members.keys().map(String::as_str))
            .chain(BUILTINS);
        for name in names {
            if !keys.iter().any(|k| k == name) {
                keys.push(name.to_string());
            }
        }
        keys
    }

    /// Which layer a name resolves to, without evaluating getters.
    fn kind_of(&self, name: &str) -> Option<PropertyKind> {
        if self.getters.contains_key(name) {
            Some(PropertyKind::Getter)
        } else if self.actions.contains_key(name) {
            Some(PropertyKind::Action)
        } else if self.current_slice().field(name).is_some() {
            Some(PropertyKind::Field)
        } else if self.members.read().contains_key(name) {
            Some(PropertyKind::Member)
        } else if BUILTINS.contains(&name) {
            Some(PropertyKind::Builtin)
        } else {
            None
        }
    }

    fn guard(&self, name: &str) -> Result<()> {
        match self.kind_of(name) {
            None | Some(PropertyKind::Member) => Ok(()),
            Some(kind) => {
                tracing::debug!(namespace = %self.namespace(), name, %kind, "rejected direct mutation");
                Err(Error::IllegalMutation {
                    namespace: self.namespace().to_string(),
                    name: name.to_string(),
                    kind,
                })
            }
        }
    }
}

impl fmt::Debug for StateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUnit")
            .field("namespace", &self.namespace())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{action, getter};
    use crate::Store;
    use serde_json::json;

    struct Todos;

    impl State for Todos {
        fn default_slice(&self) -> Slice {
            Slice::new(json!({ "items": [], "filter": "all" }))
        }

        fn getters(&self) -> Getters {
            let mut getters = Getters::new();
            getters.insert(
                "count".to_string(),
                getter(|s| json!(s.field("items").and_then(Value::as_array).map_or(0, Vec::len))),
            );
            // Shadows the slice field of the same name.
            getters.insert("filter".to_string(), getter(|_| json!("from getter")));
            getters
        }

        fn actions(&self) -> Actions {
            let mut actions = Actions::new();
            actions.insert("echo".to_string(), action(|args| Ok(json!(args))));
            actions.insert("count".to_string(), action(|_| Ok(json!("shadowed"))));
            actions
        }

        fn members(&self) -> IndexMap<String, Value> {
            IndexMap::from([("label".to_string(), json!("Todo list"))])
        }
    }

    fn unit() -> (Store, std::sync::Arc<StateUnit>) {
        let store = Store::default();
        let unit = store.register_state("todos", |_| Todos, json!({ "max": 3 }));
        (store, unit)
    }

    #[test]
    fn getters_win_over_actions_and_fields() {
        let (_store, unit) = unit();
        assert_eq!(unit.get("count").map(|p| p.kind()), Some(PropertyKind::Getter));
        assert_eq!(unit.get("filter").and_then(Property::into_value), Some(json!("from getter")));
    }

    #[test]
    fn fields_then_members_then_builtins() {
        let (_store, unit) = unit();
        assert_eq!(unit.get("items").map(|p| p.kind()), Some(PropertyKind::Field));
        assert_eq!(unit.get("label").map(|p| p.kind()), Some(PropertyKind::Member));
        assert_eq!(
            unit.get("namespace").and_then(Property::into_value),
            Some(json!("todos"))
        );
        assert_eq!(
            unit.get("definition").and_then(Property::into_value),
            Some(json!({ "max": 3 }))
        );
        assert!(unit.get("missing").is_none());
        assert!(!unit.has("missing"));
    }

    #[test]
    fn invoke_only_calls_actions() {
        let (_store, unit) = unit();
        assert_eq!(unit.invoke("echo", &[json!(1)]).unwrap(), json!([1]));
        assert!(matches!(unit.invoke("items", &[]), Err(Error::NotAnAction { .. })));
        assert!(matches!(unit.invoke("nope", &[]), Err(Error::UnknownProperty { .. })));
    }

    #[test]
    fn members_are_assignable() {
        let (_store, unit) = unit();
        unit.set("label", json!("Renamed")).unwrap();
        unit.set("fresh", json!(true)).unwrap();
        assert_eq!(unit.get("label").and_then(Property::into_value), Some(json!("Renamed")));
        assert_eq!(unit.delete("fresh").unwrap(), Some(json!(true)));
        assert!(!unit.has("fresh"));
        assert_eq!(unit.delete("never-there").unwrap(), None);
    }

    #[test]
    fn builtins_are_read_only() {
        let (_store, unit) = unit();
        let err = unit.set("namespace", json!("other")).unwrap_err();
        assert!(matches!(err, Error::IllegalMutation { kind: PropertyKind::Builtin, .. }));
        assert_eq!(unit.namespace(), "todos");
    }

    #[test]
    fn keys_follow_resolution_order() {
        let (_store, unit) = unit();
        assert_eq!(
            unit.keys(),
            vec!["count", "filter", "echo", "items", "label", "state", "namespace", "definition"]
        );
    }

    #[test]
    fn current_slice_falls_back_to_default() {
        let (store, unit) = unit();
        assert!(!store.state().contains_key("todos"));
        assert_eq!(unit.current_slice().field("filter"), Some(&json!("all")));
    }
}
