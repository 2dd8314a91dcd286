use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::state::Slice;

/// The event the store publishes after a dispatch changes a namespace.
pub const CHANGE_EVENT: &str = "change";

/// Payload of a [`CHANGE_EVENT`].
///
/// Serializes as `{ "state", "previous", "namespace", "payload" }`.
#[derive(Clone, Debug, Serialize)]
pub struct ChangeEvent {
    /// The slice after the dispatch.
    pub state: Slice,
    /// The slice the reducer received: the prior tree entry, or the
    /// unit's default slice when the tree had none.
    pub previous: Slice,
    /// Namespace that changed.
    pub namespace: String,
    /// The dispatched payload.
    pub payload: Value,
}

/// Data handed to subscriber callbacks.
#[derive(Clone, Debug)]
pub enum EventData {
    /// Published by the store itself on [`CHANGE_EVENT`].
    Change(ChangeEvent),
    /// Anything published by callers through [`Store::publish`](crate::Store::publish).
    Custom(Value),
}

impl EventData {
    /// The change event, if this is one.
    pub fn as_change(&self) -> Option<&ChangeEvent> {
        match self {
            EventData::Change(change) => Some(change),
            EventData::Custom(_) => None,
        }
    }

    /// The custom value, if this is one.
    pub fn as_custom(&self) -> Option<&Value> {
        match self {
            EventData::Custom(value) => Some(value),
            EventData::Change(_) => None,
        }
    }
}

impl From<ChangeEvent> for EventData {
    fn from(change: ChangeEvent) -> Self {
        EventData::Change(change)
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        EventData::Custom(value)
    }
}

pub(crate) type Callback = Arc<dyn Fn(&EventData) + Send + Sync>;

type EventMap = HashMap<String, Vec<Callback>>;

/// Callback lists keyed by namespace, then event name.
///
/// Lists are created lazily on first subscribe and never removed.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    lists: Mutex<HashMap<String, EventMap>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add(self: &Arc<Self>, namespace: &str, event: &str, callback: Callback) -> Subscription {
        let mut lists = self.lists.lock();
        lists
            .entry(namespace.to_string())
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(Arc::clone(&callback));

        Subscription {
            namespace: namespace.to_string(),
            event: event.to_string(),
            callback,
            registry: Arc::downgrade(self),
            removed: AtomicBool::new(false),
        }
    }

    /// Remove the first occurrence of `callback`. Returns whether one was found.
    fn remove(&self, namespace: &str, event: &str, callback: &Callback) -> bool {
        let mut lists = self.lists.lock();
        let Some(callbacks) = lists.get_mut(namespace).and_then(|events| events.get_mut(event)) else {
            return false;
        };
        match callbacks.iter().position(|c| Arc::ptr_eq(c, callback)) {
            Some(index) => {
                callbacks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Copy of the current list, so callbacks may (un)subscribe while it is iterated.
    pub(crate) fn snapshot(&self, namespace: &str, event: &str) -> Vec<Callback> {
        self.lists
            .lock()
            .get(namespace)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, namespace: &str, event: &str) -> usize {
        self.lists
            .lock()
            .get(namespace)
            .and_then(|events| events.get(event))
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`Store::subscribe`](crate::Store::subscribe).
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it. Unsubscribing
/// more than once is a no-op.
#[must_use = "dropping a Subscription does not unsubscribe; keep it to be able to"]
pub struct Subscription {
    namespace: String,
    event: String,
    callback: Callback,
    registry: Weak<SubscriberRegistry>,
    removed: AtomicBool,
}

impl Subscription {
    /// Remove this exact callback from its list.
    ///
    /// Only the first occurrence is removed, and only once per handle: a
    /// second call never touches another subscription of the same
    /// callback. Returns `false` when this handle already unsubscribed or
    /// the store has been dropped.
    pub fn unsubscribe(&self) -> bool {
        if self.removed.swap(true, Ordering::SeqCst) {
            tracing::trace!(namespace = %self.namespace, event = %self.event, "already unsubscribed");
            return false;
        }
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(&self.namespace, &self.event, &self.callback));
        tracing::trace!(
            namespace = %self.namespace,
            event = %self.event,
            removed,
            "unsubscribe"
        );
        removed
    }

    /// Namespace this subscription listens on.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Event name this subscription listens for.
    pub fn event(&self) -> &str {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback: Callback = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn lists_are_created_lazily() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.count("a", "change"), 0);
        assert!(registry.snapshot("a", "change").is_empty());

        let (_, callback) = counter();
        let _sub = registry.add("a", "change", callback);
        assert_eq!(registry.count("a", "change"), 1);
        assert_eq!(registry.count("a", "other"), 0);
    }

    #[test]
    fn unsubscribe_removes_first_occurrence_only() {
        let registry = SubscriberRegistry::new();
        let (_, callback) = counter();

        let first = registry.add("a", "change", Arc::clone(&callback));
        let _second = registry.add("a", "change", callback);
        assert_eq!(registry.count("a", "change"), 2);

        assert!(first.unsubscribe());
        assert_eq!(registry.count("a", "change"), 1);

        // A repeated unsubscribe must not take the other copy with it.
        assert!(!first.unsubscribe());
        assert_eq!(registry.count("a", "change"), 1);
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = SubscriberRegistry::new();
        let (_, callback) = counter();
        let sub = registry.add("a", "change", callback);

        drop(registry);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn event_data_accessors() {
        let custom = EventData::from(serde_json::json!({ "x": 1 }));
        assert!(custom.as_change().is_none());
        assert_eq!(custom.as_custom(), Some(&serde_json::json!({ "x": 1 })));
    }
}
