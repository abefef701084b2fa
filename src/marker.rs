//! Done-markers: proof that an element has already been initialized.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dom::{Dom, Element};

/// Attribute holding the owning instance id on an initialized root element.
pub const UID_DATA_ATTR: &str = "data-cid";

/// Unique component instance id.
///
/// Generated ids are monotonic; ids recovered from an existing marker are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid(String);

impl Uid {
    /// Generate a new unique id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Uid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Registry mapping root elements to the instance that initialized them.
///
/// It is consulted by `init` to avoid initializing the same element twice.
pub trait MarkerRegistry {
    fn lookup(&self, dom: &dyn Dom, element: Element) -> Option<Uid>;

    fn mark(&self, dom: &dyn Dom, element: Element, uid: &Uid);

    fn unmark(&self, dom: &dyn Dom, element: Element);
}

/// Persists markers as a DOM attribute (`data-cid` by default).
///
/// Markup rendered elsewhere can carry the attribute up front to opt out of
/// client-side initialization.
#[derive(Debug, Clone)]
pub struct AttributeMarkers {
    attribute: String,
}

impl AttributeMarkers {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Default for AttributeMarkers {
    fn default() -> Self {
        Self::new(UID_DATA_ATTR)
    }
}

impl MarkerRegistry for AttributeMarkers {
    fn lookup(&self, dom: &dyn Dom, element: Element) -> Option<Uid> {
        dom.attribute(element, &self.attribute)
            .filter(|uid| !uid.is_empty())
            .map(Uid::from)
    }

    fn mark(&self, dom: &dyn Dom, element: Element, uid: &Uid) {
        dom.set_attribute(element, &self.attribute, uid.as_str());
    }

    fn unmark(&self, dom: &dyn Dom, element: Element) {
        dom.remove_attribute(element, &self.attribute);
    }
}

/// Keeps markers in memory, keyed by element identity. The DOM is left untouched.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    owners: RefCell<HashMap<Element, Uid>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.owners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.borrow().is_empty()
    }
}

impl MarkerRegistry for ElementRegistry {
    fn lookup(&self, _dom: &dyn Dom, element: Element) -> Option<Uid> {
        self.owners.borrow().get(&element).cloned()
    }

    fn mark(&self, _dom: &dyn Dom, element: Element, uid: &Uid) {
        self.owners.borrow_mut().insert(element, uid.clone());
    }

    fn unmark(&self, _dom: &dyn Dom, element: Element) {
        self.owners.borrow_mut().remove(&element);
    }
}
