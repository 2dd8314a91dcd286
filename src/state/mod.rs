//! State units: the per-namespace half of the store.
//!
//! A [`State`] implementation supplies the reducer, getters and actions of
//! one namespace; the store wraps it in a [`StateUnit`], which adds the
//! read facade and the mutation guard.

mod definition;
mod slice;
mod unit;

pub use definition::{action, getter, Action, Actions, Getter, Getters, State, StateContext};
pub use slice::{payload_type, Slice, StateTree};
pub use unit::{Property, StateUnit};
