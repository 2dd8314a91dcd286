use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::state::Slice;
use crate::store::{Store, StoreInner};

/// A derived value computed from the current slice.
pub type Getter = Arc<dyn Fn(&Slice) -> Value + Send + Sync>;

/// A callable operation exposed by a unit.
pub type Action = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Getters declared by a unit, by name.
pub type Getters = IndexMap<String, Getter>;

/// Actions declared by a unit, by name.
pub type Actions = IndexMap<String, Action>;

/// Wrap a closure as a [`Getter`].
pub fn getter<F>(f: F) -> Getter
where
    F: Fn(&Slice) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an [`Action`].
pub fn action<F>(f: F) -> Action
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Behaviour of one namespace.
///
/// Every method has a default, so the smallest unit is an empty impl:
/// an identity reducer over an empty object with no getters or actions.
///
/// Getters, actions and members are read once, when the unit is
/// registered.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use statebox::{payload_type, Slice, State};
///
/// struct Counter;
///
/// impl State for Counter {
///     fn default_slice(&self) -> Slice {
///         Slice::new(json!({ "value": 0 }))
///     }
///
///     fn reduce(&self, prior: &Slice, payload: &Value) -> Slice {
///         match payload_type(payload) {
///             Some("increment") => prior.update(|s| {
///                 s["value"] = json!(s["value"].as_i64().unwrap_or(0) + 1);
///             }),
///             _ => prior.clone(),
///         }
///     }
/// }
/// ```
pub trait State: Send + Sync + 'static {
    /// Slice used while the store holds no entry for this namespace.
    fn default_slice(&self) -> Slice {
        Slice::empty()
    }

    /// Compute the next slice.
    ///
    /// Return `prior.clone()` (same identity) when the payload does not
    /// concern this namespace; any other slice is published as a change.
    fn reduce(&self, prior: &Slice, _payload: &Value) -> Slice {
        prior.clone()
    }

    /// Derived values, evaluated against the live slice on every read.
    fn getters(&self) -> Getters {
        Getters::new()
    }

    /// Callable operations, typically dispatching through a [`StateContext`].
    fn actions(&self) -> Actions {
        Actions::new()
    }

    /// Initial own members of the unit. These can be reassigned or removed
    /// through [`StateUnit::set`](crate::StateUnit::set).
    fn members(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }
}

/// What a unit factory gets to build its [`State`].
///
/// Holds a non-owning handle to the store, so a unit never keeps its store
/// alive.
#[derive(Clone)]
pub struct StateContext {
    namespace: String,
    definition: Value,
    store: Weak<StoreInner>,
}

impl StateContext {
    pub(crate) fn new(namespace: &str, definition: Value, store: Weak<StoreInner>) -> Self {
        Self {
            namespace: namespace.to_string(),
            definition,
            store,
        }
    }

    /// Namespace the unit governs.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Caller-supplied configuration, passed through unexamined.
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// The owning store, if it is still alive.
    pub fn store(&self) -> Option<Store> {
        self.store.upgrade().map(Store::from_inner)
    }

    /// Dispatch through the owning store.
    ///
    /// Does nothing when the store has been dropped.
    pub fn dispatch(&self, payload: Value) {
        match self.store() {
            Some(store) => store.dispatch(payload),
            None => tracing::debug!(namespace = %self.namespace, "dispatch on dropped store ignored"),
        }
    }

    pub(crate) fn store_ref(&self) -> &Weak<StoreInner> {
        &self.store
    }
}
