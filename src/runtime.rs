//! The host environment shared by every component of a tree.

use std::rc::Rc;

use crate::marker::{AttributeMarkers, MarkerRegistry};
use crate::{Component, ComponentLogic, Dom, Options};

/// Host environment for components.
///
/// A `Host` bundles the DOM capability and the done-marker registry. Every
/// component keeps its own clone, and child references created through
/// `set_ref` share the host of their parent.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use oxide_component::{ComponentLogic, Host, MemoryDom, State};
///
/// struct Counter;
/// impl ComponentLogic for Counter {}
///
/// let dom = Rc::new(MemoryDom::new());
/// let root = dom.append(dom.document(), "div", &[("id", "counter")]);
///
/// let host = Host::new(dom.clone());
/// let counter = host.create(Counter);
/// counter.mount("#counter", Some(State::new())).unwrap();
///
/// assert_eq!(counter.el(), Some(root));
/// assert!(counter.is_active());
/// ```
#[derive(Clone)]
pub struct Host {
    dom: Rc<dyn Dom>,
    markers: Rc<dyn MarkerRegistry>,
}

impl Host {
    /// Create a host over `dom`, storing done-markers in the `data-cid` attribute.
    pub fn new(dom: Rc<dyn Dom>) -> Self {
        Self {
            dom,
            markers: Rc::new(AttributeMarkers::default()),
        }
    }

    /// Replace the done-marker registry.
    pub fn with_markers(mut self, markers: Rc<dyn MarkerRegistry>) -> Self {
        self.markers = markers;
        self
    }

    pub fn dom(&self) -> &dyn Dom {
        &*self.dom
    }

    pub fn markers(&self) -> &dyn MarkerRegistry {
        &*self.markers
    }

    /// Construct a component with its default options.
    pub fn create<L: ComponentLogic>(&self, logic: L) -> Component {
        Component::new(self, logic, Options::new())
    }

    /// Construct a component, overriding its default options.
    pub fn create_with<L: ComponentLogic>(&self, logic: L, options: Options) -> Component {
        Component::new(self, logic, options)
    }
}
