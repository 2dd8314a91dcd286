//! # Statebox
//!
//! A small unidirectional-data-flow state container for Rust.
//!
//! ## Store
//!
//! One immutable state tree, split into namespaces:
//! - `Store` - Holds the tree, drives dispatch, publishes events
//! - `Slice` - An immutable, shared snapshot of one namespace
//! - Change detection by slice identity, notification after the whole
//!   round has been applied
//!
//! ## State units
//!
//! Per-namespace behaviour:
//! - `State` - Reducer, getters, actions and members of a namespace
//! - `StateUnit` - Read facade over getters, actions, slice fields and
//!   members that rejects direct mutation

pub mod error;
pub mod event;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use error::{Error, PropertyKind, Result};
pub use event::{ChangeEvent, EventData, Subscription, CHANGE_EVENT};
pub use state::{
    action, getter, payload_type, Action, Actions, Getter, Getters, Property, Slice, State, StateContext,
    StateTree, StateUnit,
};
pub use store::{NestedDispatch, Store, StoreConfig};
