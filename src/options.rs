//! Typed component options.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::refs::Constructor;
use crate::Component;

/// A callback stored in the options and bound to its owner when invoked.
///
/// The owning component is supplied at call time (see
/// [`Component::call_option`]), so the callback always sees the instance
/// whose options hold it.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Component, &[Value]) -> Value>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Component, &[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, this: &Component, args: &[Value]) -> Value {
        (self.0)(this, args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// One option value.
#[derive(Clone, Debug)]
pub enum OptionValue {
    Value(Value),
    Callback(Callback),
    /// A nested component constructor. Never bound to the owner.
    Component(Constructor),
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Value(value)
    }
}

impl From<Callback> for OptionValue {
    fn from(callback: Callback) -> Self {
        OptionValue::Callback(callback)
    }
}

impl From<Constructor> for OptionValue {
    fn from(constructor: Constructor) -> Self {
        OptionValue::Component(constructor)
    }
}

/// Component options, fixed once the component is constructed.
#[derive(Clone, Debug, Default)]
pub struct Options {
    entries: IndexMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.entries.get(key)? {
            OptionValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn callback(&self, key: &str) -> Option<&Callback> {
        match self.entries.get(key)? {
            OptionValue::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn constructor(&self, key: &str) -> Option<&Constructor> {
        match self.entries.get(key)? {
            OptionValue::Component(constructor) => Some(constructor),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep exactly the keys of `defaults`, each replaced by its override when present.
    pub(crate) fn layered(defaults: Options, overrides: &Options) -> Options {
        let entries = defaults
            .entries
            .into_iter()
            .map(|(key, value)| {
                let value = overrides.entries.get(&key).cloned().unwrap_or(value);
                (key, value)
            })
            .collect();
        Options { entries }
    }
}
