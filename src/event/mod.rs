//! Publish/subscribe plumbing.
//!
//! Subscribers are keyed by namespace and event name. The store publishes
//! [`CHANGE_EVENT`] itself; any other event name is free for callers.

mod subscribers;

pub use subscribers::{ChangeEvent, EventData, Subscription, CHANGE_EVENT};
pub(crate) use subscribers::SubscriberRegistry;
