//! Keyed component state and the change notifications it produces.

use serde_json::Value;
use tracing::warn;

use crate::emitter::{change_event, Emitter, CHANGE_ANY};

/// A component state snapshot. Keys keep their insertion order.
pub type State = serde_json::Map<String, Value>;

/// Convert a JSON object into a [`State`]. Any other value yields an empty state.
pub fn into_state(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        Value::Null => State::new(),
        other => {
            warn!(value = %other, "state must be a JSON object, ignoring");
            State::new()
        }
    }
}

/// Describes the change-set passed to `set_state`.
pub enum Updater {
    /// A partial mapping of keys to new values.
    Partial(State),
    /// Computes the partial mapping from the current state.
    Compute(Box<dyn FnOnce(&State) -> State>),
}

impl Updater {
    pub fn compute<F>(f: F) -> Self
    where
        F: FnOnce(&State) -> State + 'static,
    {
        Updater::Compute(Box::new(f))
    }

    pub(crate) fn resolve(self, current: &State) -> State {
        match self {
            Updater::Partial(change_set) => change_set,
            Updater::Compute(f) => f(current),
        }
    }
}

impl From<State> for Updater {
    fn from(change_set: State) -> Self {
        Updater::Partial(change_set)
    }
}

impl From<Value> for Updater {
    fn from(value: Value) -> Self {
        Updater::Partial(into_state(value))
    }
}

/// A computed state transition together with the events it must emit.
///
/// Transitions are computed without touching the component, so user
/// predicates never run while component internals are borrowed.
#[derive(Debug, Clone)]
pub struct StateChange {
    prev: State,
    next: State,
    /// Keys to notify, in emission order.
    keys: Vec<String>,
    notify: bool,
}

impl StateChange {
    /// Apply `change_set` to `prev`, keeping the key set of `prev`.
    ///
    /// Keys missing from `prev` are dropped. A key counts as changed only if
    /// the change-set carries it and `should_update` accepts the new value.
    /// Changed keys are notified in reverse detection order.
    pub fn update<F>(prev: &State, change_set: &State, mut should_update: F) -> Self
    where
        F: FnMut(&str, &Value, &Value) -> bool,
    {
        let mut changed = Vec::new();
        let mut next = State::new();

        for (key, current) in prev {
            match change_set.get(key) {
                Some(value) if should_update(key, current, value) => {
                    changed.push(key.clone());
                    next.insert(key.clone(), value.clone());
                }
                _ => {
                    next.insert(key.clone(), current.clone());
                }
            }
        }

        changed.reverse();
        let notify = !changed.is_empty();
        Self {
            prev: prev.clone(),
            next,
            keys: changed,
            notify,
        }
    }

    /// Swap `prev` for `next` wholesale. Every key of `next` is notified.
    pub fn replace(prev: &State, next: State) -> Self {
        let keys = next.keys().cloned().collect();
        Self {
            prev: prev.clone(),
            next,
            keys,
            notify: true,
        }
    }

    pub fn prev(&self) -> &State {
        &self.prev
    }

    pub fn next(&self) -> &State {
        &self.next
    }

    /// Keys that will be notified, in emission order.
    pub fn changed_keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        !self.notify
    }

    /// Emit `change:<key>` for every notified key, then one `change:*`.
    pub fn emit(&self, events: &Emitter) {
        if !self.notify {
            return;
        }
        for key in &self.keys {
            let next = self.next.get(key).cloned().unwrap_or(Value::Null);
            let prev = self.prev.get(key).cloned().unwrap_or(Value::Null);
            events.emit(&change_event(key), &[next, prev]);
        }
        events.emit(
            CHANGE_ANY,
            &[
                Value::Object(self.next.clone()),
                Value::Object(self.prev.clone()),
            ],
        );
    }
}
