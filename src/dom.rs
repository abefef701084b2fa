//! The DOM capability consumed by components.
//!
//! Components never touch a concrete DOM implementation. Everything they need
//! (scoped queries, attributes, tree edits and event listeners) goes through
//! the [`Dom`] trait, so the same component tree can drive a browser binding,
//! a headless document or the in-memory test double.

use std::fmt;
use std::rc::Rc;

/// Opaque handle to a DOM element owned by a [`Dom`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u64);

impl Element {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A dispatched DOM event as seen by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub name: String,
    /// Element the event was dispatched on.
    pub target: Element,
    /// Element whose listener is currently running.
    pub current_target: Element,
}

/// A raw DOM event listener. Listener identity is pointer identity.
pub type DomHandler = Rc<dyn Fn(&DomEvent)>;

/// Minimal DOM surface required by the component runtime.
pub trait Dom {
    /// First descendant of `scope` (or of the document) matching `selector`.
    fn query(&self, selector: &str, scope: Option<Element>) -> Option<Element>;

    /// Every descendant of `scope` (or of the document) matching `selector`, in document order.
    fn query_all(&self, selector: &str, scope: Option<Element>) -> Vec<Element>;

    fn create_element(&self, tag: &str) -> Element;

    fn attribute(&self, element: Element, name: &str) -> Option<String>;

    fn set_attribute(&self, element: Element, name: &str, value: &str);

    fn remove_attribute(&self, element: Element, name: &str);

    fn parent(&self, element: Element) -> Option<Element>;

    /// Inclusive containment, as `Node.contains`.
    fn contains(&self, ancestor: Element, node: Element) -> bool;

    fn append_child(&self, parent: Element, child: Element);

    fn replace_child(&self, parent: Element, new_child: Element, old_child: Element);

    fn remove_child(&self, parent: Element, child: Element);

    fn add_event_listener(&self, element: Element, event: &str, handler: &DomHandler);

    fn remove_event_listener(&self, element: Element, event: &str, handler: &DomHandler);
}

/// Where a component (or a child reference) should be mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A CSS selector resolved against the whole document.
    Selector(String),
    Element(Element),
}

impl Target {
    pub(crate) fn resolve(&self, dom: &dyn Dom) -> Option<Element> {
        match self {
            Target::Selector(selector) => dom.query(selector, None),
            Target::Element(element) => Some(*element),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Selector(selector) => write!(f, "{selector}"),
            Target::Element(element) => write!(f, "element #{}", element.raw()),
        }
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

impl From<Element> for Target {
    fn from(element: Element) -> Self {
        Target::Element(element)
    }
}

impl From<&Target> for Target {
    fn from(target: &Target) -> Self {
        target.clone()
    }
}
