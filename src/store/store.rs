use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::event::{ChangeEvent, EventData, SubscriberRegistry, Subscription, CHANGE_EVENT};
use crate::state::{Slice, State, StateContext, StateTree, StateUnit};
use crate::store::{NestedDispatch, StoreConfig};

#[derive(Default)]
struct Round {
    active: bool,
    queue: VecDeque<Value>,
}

/// Shared internals behind every [`Store`] handle.
pub(crate) struct StoreInner {
    tree: RwLock<Arc<StateTree>>,
    units: RwLock<IndexMap<String, Arc<StateUnit>>>,
    subscribers: Arc<SubscriberRegistry>,
    config: StoreConfig,
    round: Mutex<Round>,
    // Held for a whole dispatch; reentrant so user code may dispatch again.
    dispatching: ReentrantMutex<()>,
}

impl StoreInner {
    pub(crate) fn slice(&self, namespace: &str) -> Option<Slice> {
        self.tree.read().get(namespace).cloned()
    }
}

/// The single source of truth for a namespaced state tree.
///
/// A store holds one immutable snapshot of the whole tree. Namespaces are
/// governed by [`StateUnit`]s registered with
/// [`register_state`](Store::register_state); the tree only ever changes
/// through [`dispatch`](Store::dispatch).
///
/// Handles are cheap to clone and share the same store. Dispatches from
/// different threads are serialized: a round runs to completion, including
/// its change events, before another thread's round starts. The calling
/// thread may re-enter the store from reducers, getters, actions and
/// subscribers; a subscriber that blocks on another thread's dispatch
/// deadlocks.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use statebox::{payload_type, Slice, State, Store};
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
///
/// let store = Store::default();
/// store.register_state("counter", |_| Counter, Value::Null);
///
/// store.dispatch(json!({ "type": "increment" }));
/// assert_eq!(store.state()["counter"].field("value"), Some(&json!(1)));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store seeded with an initial tree.
    pub fn new(initial: StateTree) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(initial: StateTree, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tree: RwLock::new(Arc::new(initial)),
                units: RwLock::new(IndexMap::new()),
                subscribers: SubscriberRegistry::new(),
                config,
                round: Mutex::new(Round::default()),
                dispatching: ReentrantMutex::new(()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The current tree snapshot.
    ///
    /// The snapshot is immutable; a later dispatch swaps in a new tree and
    /// leaves this one untouched.
    pub fn state(&self) -> Arc<StateTree> {
        Arc::clone(&*self.inner.tree.read())
    }

    /// The current slice of one namespace, if the tree has one.
    pub fn slice(&self, namespace: &str) -> Option<Slice> {
        self.inner.slice(namespace)
    }

    /// Build a unit for `namespace` and install it.
    ///
    /// A unit already registered under the same namespace is replaced
    /// silently and keeps its position in dispatch order.
    pub fn register_state<S, F>(&self, namespace: &str, factory: F, definition: Value) -> Arc<StateUnit>
    where
        S: State,
        F: FnOnce(StateContext) -> S,
    {
        let context = StateContext::new(namespace, definition, Arc::downgrade(&self.inner));
        let behavior = factory(context.clone());
        let unit = Arc::new(StateUnit::new(context, Box::new(behavior)));

        let replaced = self
            .inner
            .units
            .write()
            .insert(namespace.to_string(), Arc::clone(&unit))
            .is_some();
        tracing::debug!(namespace, replaced, "registered state");
        unit
    }

    /// Remove the unit for `namespace`.
    ///
    /// The namespace's last slice stays in the tree, and its subscribers
    /// stay subscribed.
    pub fn unregister_state(&self, namespace: &str) -> Option<Arc<StateUnit>> {
        let removed = self.inner.units.write().shift_remove(namespace);
        tracing::debug!(namespace, found = removed.is_some(), "unregistered state");
        removed
    }

    /// The unit registered for `namespace`.
    pub fn unit(&self, namespace: &str) -> Option<Arc<StateUnit>> {
        self.inner.units.read().get(namespace).cloned()
    }

    /// Whether a unit is registered for `namespace`.
    pub fn has_unit(&self, namespace: &str) -> bool {
        self.inner.units.read().contains_key(namespace)
    }

    /// Registered namespaces in dispatch order.
    pub fn namespaces(&self) -> Vec<String> {
        self.inner.units.read().keys().cloned().collect()
    }

    /// Run one dispatch round.
    ///
    /// Every registered unit reduces its slice against the same
    /// pre-dispatch snapshot. The new tree is swapped in, and only then is
    /// [`CHANGE_EVENT`] published, in registration order, for every
    /// namespace whose reducer returned a different slice identity.
    ///
    /// A panic in a reducer leaves the tree untouched. A panic in a
    /// subscriber skips the remaining events of the round. Both unwind to
    /// the caller.
    ///
    /// See [`NestedDispatch`] for dispatches issued during a round.
    pub fn dispatch(&self, payload: Value) {
        let _serialized = self.inner.dispatching.lock();
        if self.inner.config.nested_dispatch == NestedDispatch::Immediate {
            self.run_round(payload);
            return;
        }

        {
            let mut round = self.inner.round.lock();
            if round.active {
                round.queue.push_back(payload);
                tracing::debug!(queued = round.queue.len(), "nested dispatch queued");
                return;
            }
            round.active = true;
        }

        let _active = ActiveRound(&self.inner);
        let mut next = Some(payload);
        while let Some(payload) = next {
            self.run_round(payload);
            next = self.inner.round.lock().queue.pop_front();
        }
    }

    fn run_round(&self, payload: Value) {
        let units: Vec<(String, Arc<StateUnit>)> = self
            .inner
            .units
            .read()
            .iter()
            .map(|(namespace, unit)| (namespace.clone(), Arc::clone(unit)))
            .collect();
        let prior = self.state();

        let mut tree = StateTree::clone(&prior);
        let mut changes = Vec::new();
        for (namespace, unit) in units {
            let previous = prior.get(&namespace);
            let input = previous.cloned().unwrap_or_else(|| unit.default_slice());
            let next = unit.reduce(&input, &payload);

            if previous.map_or(true, |p| !p.ptr_eq(&next)) {
                changes.push(ChangeEvent {
                    state: next.clone(),
                    previous: input.clone(),
                    namespace: namespace.clone(),
                    payload: payload.clone(),
                });
            }
            tree.insert(namespace, next);
        }

        *self.inner.tree.write() = Arc::new(tree);
        tracing::debug!(changed = changes.len(), "dispatch round applied");

        for change in changes {
            let namespace = change.namespace.clone();
            self.publish(&namespace, CHANGE_EVENT, change);
        }
    }

    /// Call every subscriber of `(namespace, event)` in subscription order.
    ///
    /// Callbacks subscribed or unsubscribed while this runs take effect
    /// from the next publish.
    pub fn publish(&self, namespace: &str, event: &str, data: impl Into<EventData>) {
        let data = data.into();
        let callbacks = self.inner.subscribers.snapshot(namespace, event);
        tracing::trace!(namespace, event, subscribers = callbacks.len(), "publish");
        for callback in callbacks {
            callback(&data);
        }
    }

    /// Subscribe to an event of a namespace.
    ///
    /// The namespace does not need a registered unit.
    pub fn subscribe<F>(&self, namespace: &str, event: &str, callback: F) -> Subscription
    where
        F: Fn(&EventData) + Send + Sync + 'static,
    {
        tracing::trace!(namespace, event, "subscribe");
        self.inner.subscribers.add(namespace, event, Arc::new(callback))
    }

    /// Subscribe to [`CHANGE_EVENT`] with a typed callback.
    ///
    /// Custom data published on `"change"` by callers is skipped.
    pub fn subscribe_changes<F>(&self, namespace: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.subscribe(namespace, CHANGE_EVENT, move |data| {
            if let Some(change) = data.as_change() {
                callback(change);
            }
        })
    }

    /// Number of callbacks subscribed to `(namespace, event)`.
    pub fn subscriber_count(&self, namespace: &str, event: &str) -> usize {
        self.inner.subscribers.count(namespace, event)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StateTree::new())
    }
}

/// Clears the round flag even when a reducer or subscriber panics.
struct ActiveRound<'a>(&'a StoreInner);

impl Drop for ActiveRound<'_> {
    fn drop(&mut self) {
        let mut round = self.0.round.lock();
        round.active = false;
        if std::thread::panicking() {
            round.queue.clear();
        }
    }
}
