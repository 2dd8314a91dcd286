use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// The full state tree: one slice per namespace, in insertion order.
pub type StateTree = IndexMap<String, Slice>;

/// An immutable, shared snapshot of one namespace's state.
///
/// Cloning a slice shares the same allocation. Change detection in
/// [`Store::dispatch`](crate::Store::dispatch) compares slices by identity
/// ([`Slice::ptr_eq`]), never by contents: a reducer signals "nothing
/// changed" by returning a clone of its input, and any freshly built slice
/// counts as a change even if it is deep-equal to the old one.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use statebox::Slice;
///
/// let a = Slice::new(json!({ "value": 1 }));
/// let b = a.clone();
/// let c = Slice::new(json!({ "value": 1 }));
///
/// assert!(a.ptr_eq(&b));
/// assert!(!a.ptr_eq(&c));
/// assert_eq!(*a, *c);
/// ```
#[derive(Clone)]
pub struct Slice(Arc<Value>);

impl Slice {
    /// Wrap a value in a new slice with its own identity.
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// A fresh empty object.
    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Whether both slices are the same allocation.
    pub fn ptr_eq(&self, other: &Slice) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Read a top-level field when the slice is an object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|fields| fields.get(name))
    }

    /// Top-level field names when the slice is an object.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0
            .as_object()
            .into_iter()
            .flat_map(|fields| fields.keys().map(String::as_str))
    }

    /// Build the next slice from a copy of this one.
    ///
    /// The copy is a new identity, so returning it from a reducer always
    /// reports a change.
    pub fn update(&self, f: impl FnOnce(&mut Value)) -> Slice {
        let mut next = (*self.0).clone();
        f(&mut next);
        Slice::new(next)
    }

    /// Borrow the underlying value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Deref for Slice {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Slice {
    fn from(value: Value) -> Self {
        Slice::new(value)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Serialize for Slice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Read the conventional `"type"` discriminator of a payload.
pub fn payload_type(payload: &Value) -> Option<&str> {
    payload.get("type").and_then(Value::as_str)
}
