//! Declarative DOM listeners and their bookkeeping.

use tracing::{debug, warn};

use crate::dom::{DomEvent, DomHandler, Element};
use crate::Component;

/// Prefix selecting a declared element reference instead of a CSS query.
pub const ELEMENT_REF_MARKER: char = '@';

/// Element a listener definition points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerTarget {
    /// The component root.
    Root,
    /// A named element resolved at mount (`@name`).
    ElementRef(String),
    /// A CSS selector resolved inside the root.
    Selector(String),
}

/// A parsed `"event[ target]"` listener definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerDef {
    pub event: String,
    pub target: ListenerTarget,
}

impl ListenerDef {
    /// Parse a definition. The event name ends at the first space and the
    /// remainder, if any, is the target.
    pub fn parse(definition: &str) -> Option<Self> {
        let (event, target) = match definition.split_once(' ') {
            Some((event, target)) => (event, Some(target)),
            None => (definition, None),
        };
        if event.is_empty() {
            return None;
        }

        let target = match target {
            None => ListenerTarget::Root,
            Some("") => return None,
            Some(target) => match target.strip_prefix(ELEMENT_REF_MARKER) {
                Some(name) => ListenerTarget::ElementRef(name.to_string()),
                None => ListenerTarget::Selector(target.to_string()),
            },
        };

        Some(Self {
            event: event.to_string(),
            target,
        })
    }
}

/// A listener attached by a component.
pub(crate) struct ListenerBinding {
    pub(crate) event: String,
    pub(crate) element: Element,
    pub(crate) handler: DomHandler,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    bindings: Vec<ListenerBinding>,
}

impl ListenerRegistry {
    pub(crate) fn push(&mut self, binding: ListenerBinding) {
        self.bindings.push(binding);
    }

    pub(crate) fn take(&mut self) -> Vec<ListenerBinding> {
        std::mem::take(&mut self.bindings)
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

impl Component {
    /// Attach a DOM listener from an `"event[ target]"` definition.
    ///
    /// Without a target the listener goes on the root element. A target
    /// starting with `@` names an element declared with `selector`, anything
    /// else is queried inside the root. Returns `false` when the target does
    /// not resolve; the listener is then skipped.
    pub fn set_listener<F>(&self, definition: &str, handler: F) -> bool
    where
        F: Fn(&DomEvent) + 'static,
    {
        let Some(parsed) = ListenerDef::parse(definition) else {
            warn!(definition, "invalid listener definition");
            return false;
        };

        let element = match &parsed.target {
            ListenerTarget::Root => self.el(),
            ListenerTarget::ElementRef(name) => self.element_ref(name),
            ListenerTarget::Selector(selector) => self.dom().query(selector, self.el()),
        };
        let Some(element) = element else {
            debug!(definition, "listener target not found, skipping");
            return false;
        };

        let handler: DomHandler = std::rc::Rc::new(handler);
        self.dom().add_event_listener(element, &parsed.event, &handler);
        self.core_mut().listeners.push(ListenerBinding {
            event: parsed.event,
            element,
            handler,
        });
        true
    }

    /// Remove every listener attached through [`set_listener`](Self::set_listener).
    pub fn remove_listeners(&self) {
        let bindings = self.core_mut().listeners.take();
        for binding in bindings {
            self.dom()
                .remove_event_listener(binding.element, &binding.event, &binding.handler);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.core().listeners.len()
    }
}
