//! Namespaced publish/subscribe events carried by every component.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// Wildcard state-change event, emitted once after every notifying state update.
pub const CHANGE_ANY: &str = "change:*";

/// Name of the event emitted when the state key `key` changes.
pub fn change_event(key: &str) -> String {
    format!("change:{key}")
}

/// Name of the event a parent emits on its children through `broadcast`.
pub fn broadcast_event(name: &str) -> String {
    format!("broadcast:{name}")
}

/// A subscribed event handler.
pub type Handler = Rc<dyn Fn(&[Value])>;

/// Handle returned by [`Emitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event emitter owned by a component.
///
/// Event names are plain strings: `change:<key>`, `change:*` and
/// `broadcast:<name>` carry no structure beyond their spelling.
///
/// Handlers run synchronously, in subscription order, over a snapshot of the
/// subscriptions taken when [`emit`](Self::emit) starts. A handler may
/// therefore subscribe, unsubscribe or emit again without invalidating the
/// dispatch in progress.
///
/// # Example
///
/// ```rust
/// use oxide_component::Emitter;
/// use serde_json::json;
///
/// let events = Emitter::new();
/// let id = events.on("change:count", |args| {
///     assert_eq!(args[0], json!(1));
/// });
///
/// events.emit("change:count", &[json!(1), json!(0)]);
/// assert!(events.off("change:count", id));
/// ```
#[derive(Default)]
pub struct Emitter {
    next_id: Cell<u64>,
    handlers: RefCell<IndexMap<String, Vec<(SubscriptionId, Handler)>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) + 'static,
    {
        self.on_handler(event, Rc::new(handler))
    }

    /// Subscribe an already shared handler to `event`.
    pub fn on_handler(&self, event: impl Into<String>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one subscription. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.shift_remove(event);
        }
        removed
    }

    /// Remove every subscription to `event`.
    pub fn off_event(&self, event: &str) {
        self.handlers.borrow_mut().shift_remove(event);
    }

    /// Remove every subscription.
    pub fn off_all(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Invoke every handler subscribed to `event` with `args`.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let snapshot: Vec<Handler> = match self.handlers.borrow().get(event) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return,
        };

        for handler in snapshot {
            handler(args);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }
}
