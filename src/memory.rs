//! In-memory DOM for tests.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::{Dom, DomEvent, DomHandler, Element};

const DOCUMENT: Element = Element::from_raw(0);

struct Node {
    tag: String,
    attributes: IndexMap<String, String>,
    parent: Option<Element>,
    children: Vec<Element>,
    listeners: Vec<(String, DomHandler)>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// Test DOM that keeps every node in an arena.
///
/// Only available with the `testing` feature.
///
/// Selectors support compound simple selectors (`div`, `#id`, `.class`,
/// `[attr]`, `[attr=value]`) joined by descendant combinators.
///
/// # Example
///
/// ```rust
/// use oxide_component::{Dom, MemoryDom};
///
/// let dom = MemoryDom::new();
/// let app = dom.append(dom.document(), "div", &[("id", "app")]);
/// let title = dom.append(app, "h1", &[("class", "title big")]);
///
/// assert_eq!(dom.query("#app .title", None), Some(title));
/// assert_eq!(dom.query("h1.big", Some(app)), Some(title));
/// ```
pub struct MemoryDom {
    nodes: RefCell<Vec<Node>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![Node::new("#document")]),
        }
    }

    /// The document root every query falls back to.
    pub fn document(&self) -> Element {
        DOCUMENT
    }

    /// Create a parentless element with the given attributes.
    pub fn element(&self, tag: &str, attributes: &[(&str, &str)]) -> Element {
        let element = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(element, name, value);
        }
        element
    }

    /// Create an element and append it to `parent`.
    pub fn append(&self, parent: Element, tag: &str, attributes: &[(&str, &str)]) -> Element {
        let element = self.element(tag, attributes);
        self.append_child(parent, element);
        element
    }

    pub fn children(&self, element: Element) -> Vec<Element> {
        self.with_node(element, |node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, element: Element) -> Option<String> {
        self.with_node(element, |node| node.tag.clone())
    }

    pub fn listener_count(&self, element: Element) -> usize {
        self.with_node(element, |node| node.listeners.len())
            .unwrap_or_default()
    }

    /// Dispatch `event` on `target`, bubbling up to the document.
    pub fn dispatch(&self, target: Element, event: &str) {
        let mut current = Some(target);
        while let Some(element) = current {
            let handlers: Vec<DomHandler> = self
                .with_node(element, |node| {
                    node.listeners
                        .iter()
                        .filter(|(name, _)| name == event)
                        .map(|(_, handler)| handler.clone())
                        .collect()
                })
                .unwrap_or_default();

            let dom_event = DomEvent {
                name: event.to_string(),
                target,
                current_target: element,
            };
            for handler in handlers {
                handler(&dom_event);
            }

            current = self.parent(element);
        }
    }

    fn with_node<R>(&self, element: Element, f: impl FnOnce(&Node) -> R) -> Option<R> {
        let nodes = self.nodes.borrow();
        nodes.get(element.raw() as usize).map(f)
    }

    fn with_node_mut<R>(&self, element: Element, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let mut nodes = self.nodes.borrow_mut();
        nodes.get_mut(element.raw() as usize).map(f)
    }

    fn detach(&self, element: Element) {
        let Some(parent) = self.parent(element) else {
            return;
        };
        self.with_node_mut(parent, |node| node.children.retain(|child| *child != element));
        self.with_node_mut(element, |node| node.parent = None);
    }

    fn descendants(&self, root: Element) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children(root).into_iter().rev().collect();
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(self.children(element).into_iter().rev());
        }
        out
    }

    fn matches(&self, element: Element, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.parts.split_last() else {
            return false;
        };
        if !self.matches_simple(element, last) {
            return false;
        }

        let mut remaining = ancestors.len();
        let mut current = self.parent(element);
        while remaining > 0 {
            let Some(ancestor) = current else {
                break;
            };
            if self.matches_simple(ancestor, &ancestors[remaining - 1]) {
                remaining -= 1;
            }
            current = self.parent(ancestor);
        }
        remaining == 0
    }

    fn matches_simple(&self, element: Element, simple: &SimpleSelector) -> bool {
        if element == DOCUMENT {
            return false;
        }
        self.with_node(element, |node| {
            if let Some(tag) = &simple.tag {
                if node.tag != *tag {
                    return false;
                }
            }
            if let Some(id) = &simple.id {
                if node.attributes.get("id") != Some(id) {
                    return false;
                }
            }
            if !simple.classes.is_empty() {
                let classes = node.attributes.get("class").map(String::as_str).unwrap_or("");
                let found = |class: &String| classes.split_whitespace().any(|c| c == class);
                if !simple.classes.iter().all(found) {
                    return false;
                }
            }
            simple.attributes.iter().all(|(name, expected)| {
                match (node.attributes.get(name), expected) {
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                    (None, _) => false,
                }
            })
        })
        .unwrap_or(false)
    }
}

impl Dom for MemoryDom {
    fn query(&self, selector: &str, scope: Option<Element>) -> Option<Element> {
        let selector = Selector::parse(selector)?;
        self.descendants(scope.unwrap_or(DOCUMENT))
            .into_iter()
            .find(|element| self.matches(*element, &selector))
    }

    fn query_all(&self, selector: &str, scope: Option<Element>) -> Vec<Element> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.descendants(scope.unwrap_or(DOCUMENT))
            .into_iter()
            .filter(|element| self.matches(*element, &selector))
            .collect()
    }

    fn create_element(&self, tag: &str) -> Element {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node::new(tag));
        Element::from_raw((nodes.len() - 1) as u64)
    }

    fn attribute(&self, element: Element, name: &str) -> Option<String> {
        self.with_node(element, |node| node.attributes.get(name).cloned())
            .flatten()
    }

    fn set_attribute(&self, element: Element, name: &str, value: &str) {
        self.with_node_mut(element, |node| {
            node.attributes.insert(name.to_string(), value.to_string());
        });
    }

    fn remove_attribute(&self, element: Element, name: &str) {
        self.with_node_mut(element, |node| {
            node.attributes.shift_remove(name);
        });
    }

    fn parent(&self, element: Element) -> Option<Element> {
        self.with_node(element, |node| node.parent).flatten()
    }

    fn contains(&self, ancestor: Element, node: Element) -> bool {
        let mut current = Some(node);
        while let Some(element) = current {
            if element == ancestor {
                return true;
            }
            current = self.parent(element);
        }
        false
    }

    fn append_child(&self, parent: Element, child: Element) {
        if self.contains(child, parent) {
            return;
        }
        self.detach(child);
        self.with_node_mut(parent, |node| node.children.push(child));
        self.with_node_mut(child, |node| node.parent = Some(parent));
    }

    fn replace_child(&self, parent: Element, new_child: Element, old_child: Element) {
        if self.parent(old_child) != Some(parent) || self.contains(new_child, parent) {
            return;
        }
        if new_child == old_child {
            return;
        }
        self.detach(new_child);
        self.with_node_mut(parent, |node| {
            if let Some(slot) = node.children.iter_mut().find(|child| **child == old_child) {
                *slot = new_child;
            }
        });
        self.with_node_mut(old_child, |node| node.parent = None);
        self.with_node_mut(new_child, |node| node.parent = Some(parent));
    }

    fn remove_child(&self, parent: Element, child: Element) {
        if self.parent(child) == Some(parent) {
            self.detach(child);
        }
    }

    fn add_event_listener(&self, element: Element, event: &str, handler: &DomHandler) {
        self.with_node_mut(element, |node| {
            let exists = node
                .listeners
                .iter()
                .any(|(name, existing)| name == event && Rc::ptr_eq(existing, handler));
            if !exists {
                node.listeners.push((event.to_string(), handler.clone()));
            }
        });
    }

    fn remove_event_listener(&self, element: Element, event: &str, handler: &DomHandler) {
        self.with_node_mut(element, |node| {
            node.listeners
                .retain(|(name, existing)| !(name == event && Rc::ptr_eq(existing, handler)));
        });
    }
}

/// A selector made of simple selectors joined by descendant combinators.
struct Selector {
    parts: Vec<SimpleSelector>,
}

#[derive(Default, Debug, PartialEq)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    fn parse(selector: &str) -> Option<Self> {
        let parts = selector
            .split_whitespace()
            .map(SimpleSelector::parse)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }
}

impl SimpleSelector {
    fn parse(source: &str) -> Option<Self> {
        let is_delimiter = |c: char| matches!(c, '#' | '.' | '[');
        let mut out = Self::default();

        let tag_end = source.find(is_delimiter).unwrap_or(source.len());
        if tag_end > 0 {
            out.tag = Some(source[..tag_end].to_ascii_lowercase());
        }

        let mut rest = &source[tag_end..];
        while let Some(first) = rest.chars().next() {
            match first {
                '#' | '.' => {
                    let body = &rest[1..];
                    let end = body.find(is_delimiter).unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return None;
                    }
                    if first == '#' {
                        out.id = Some(name.to_string());
                    } else {
                        out.classes.push(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let end = rest.find(']')?;
                    let inner = &rest[1..end];
                    let (name, value) = match inner.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim_matches(|c| c == '"' || c == '\'');
                            (name, Some(value.to_string()))
                        }
                        None => (inner, None),
                    };
                    if name.is_empty() {
                        return None;
                    }
                    out.attributes.push((name.to_string(), value));
                    rest = &rest[end + 1..];
                }
                _ => return None,
            }
        }

        Some(out)
    }
}
