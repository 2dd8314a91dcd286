//! Error types for store and state unit operations.
//!
//! Every error here is caller-induced misuse. Faults raised by user code
//! (reducers, getters, subscriber callbacks) are not wrapped: they unwind
//! straight through the store to whoever called `dispatch` or `publish`.

use std::fmt;

use thiserror::Error;

/// Which layer of a state unit a property name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// A derived value computed from the current slice.
    Getter,
    /// A callable operation.
    Action,
    /// A field of the current slice.
    Field,
    /// An assignable member declared on the unit itself.
    Member,
    /// A read-only member every unit carries (`state`, `namespace`, `definition`).
    Builtin,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Getter => "getter",
            PropertyKind::Action => "action",
            PropertyKind::Field => "state field",
            PropertyKind::Member => "member",
            PropertyKind::Builtin => "built-in member",
        };
        f.write_str(name)
    }
}

/// All statebox errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Assignment or deletion of a getter, action, slice field or built-in.
    ///
    /// The only sanctioned way to change a slice is `Store::dispatch`.
    #[error("cannot modify {kind} `{name}` of `{namespace}` directly: {}", hint(.kind))]
    IllegalMutation {
        /// Namespace of the unit the mutation was attempted on
        namespace: String,
        /// Property name
        name: String,
        /// What the name resolved to
        kind: PropertyKind,
    },

    /// `invoke` was called with a name that resolves to something other than an action.
    #[error("`{name}` of `{namespace}` is not an action")]
    NotAnAction {
        /// Namespace of the unit
        namespace: String,
        /// Property name
        name: String,
    },

    /// The name resolves to nothing on the unit.
    #[error("`{namespace}` has no property `{name}`")]
    UnknownProperty {
        /// Namespace of the unit
        namespace: String,
        /// Property name
        name: String,
    },

    /// Invalid store configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn hint(kind: &PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Getter | PropertyKind::Action => "extend the state definition instead",
        PropertyKind::Field => "use dispatch instead",
        PropertyKind::Member | PropertyKind::Builtin => "this member is read-only",
    }
}

/// Result type for statebox operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error rejected a direct mutation.
    pub fn is_illegal_mutation(&self) -> bool {
        matches!(self, Error::IllegalMutation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
