//! The store: state tree, unit registry and dispatch.
//!
//! A dispatch round reduces every namespace against one snapshot, swaps in
//! the new tree, and only then notifies subscribers, so no subscriber ever
//! sees a partially applied round.

mod config;
mod store;

pub use config::{NestedDispatch, StoreConfig};
pub(crate) use store::StoreInner;
pub use store::Store;
