//! A component-tree runtime for DOM-driven widgets, without a virtual DOM.
//!
//! Components own a rectangle of real DOM, keep typed keyed state, wire
//! declarative DOM listeners and compose into parent/child trees whose
//! children are created, mounted, updated and torn down independently.
//!
//! - [`ComponentLogic`] describes a component type: options, declarations
//!   (selectors, listeners, actions, readiness) and lifecycle hooks.
//! - [`Component`] is a live instance driven through
//!   `mount → init → ready → destroy`.
//! - [`Component::set_ref`] grows the tree; [`Component::destroy`] tears it
//!   down concurrently.
//! - [`Sandbox`] starts the registered component types on an application root.
//! - [`Dom`] is the only way the runtime touches the document.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use futures::executor::block_on;
//! use oxide_component::{
//!     into_state, Component, ComponentLogic, Constructor, Declarations, Host, MemoryDom,
//!     Options, Props, RefConfig,
//! };
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Label;
//!
//! impl ComponentLogic for Label {
//!     fn declare(&self, _options: &Options, declare: &mut Declarations) {
//!         declare.state("text", json!(""));
//!     }
//! }
//!
//! struct Counter;
//!
//! impl ComponentLogic for Counter {
//!     fn declare(&self, _options: &Options, declare: &mut Declarations) {
//!         declare
//!             .state("count", json!(0))
//!             .listener("click", |counter, _event| {
//!                 let count = counter.get_state("count", json!(0)).as_i64().unwrap_or(0);
//!                 counter.set_state(json!({ "count": count + 1 }));
//!             });
//!     }
//! }
//!
//! let dom = Rc::new(MemoryDom::new());
//! let root = dom.append(dom.document(), "div", &[("id", "app")]);
//! let label_el = dom.append(root, "span", &[("class", "label")]);
//!
//! let host = Host::new(dom.clone());
//! let counter = host.create(Counter);
//! counter.mount("#app", Some(into_state(json!({})))).unwrap();
//!
//! let label = block_on(counter.set_ref(
//!     RefConfig::new("label", Constructor::of::<Label>()).el(label_el),
//!     Some(Props::new().bind("count>text", |count: &serde_json::Value, _: &Component| {
//!         json!(format!("clicked {count} times"))
//!     })),
//! ))
//! .unwrap();
//!
//! dom.dispatch(root, "click");
//! assert_eq!(label.get_state("text", json!(null)), json!("clicked 1 times"));
//!
//! block_on(counter.destroy()).unwrap();
//! assert!(!counter.is_active());
//! ```

// Module declarations
mod component;
mod context;
mod dom;
mod emitter;
mod error;
mod listeners;
mod logic;
mod marker;
mod options;
mod refs;
mod runtime;
mod sandbox;
mod state;

#[cfg(any(test, feature = "testing"))]
mod memory;

// Public re-exports
pub use component::{Component, Phase, WeakComponent, FALLBACK_ID_PREFIX};
pub use context::Context;
pub use dom::{Dom, DomEvent, DomHandler, Element, Target};
pub use emitter::{broadcast_event, change_event, Emitter, Handler, SubscriptionId, CHANGE_ANY};
pub use error::{ComponentError, Result, TeardownFailure};
pub use listeners::{ListenerDef, ListenerTarget, ELEMENT_REF_MARKER};
pub use logic::{ActionFn, ComponentLogic, Declarations, ListenerFn, ReadyStateFn};
pub use marker::{AttributeMarkers, ElementRegistry, MarkerRegistry, Uid, UID_DATA_ATTR};
pub use options::{Callback, OptionValue, Options};
pub use refs::{Binding, ComponentSource, Constructor, Factory, Prop, Props, RefConfig};
pub use runtime::Host;
pub use sandbox::{
    Registration, Sandbox, SandboxConfig, BEFORE_START, BEFORE_STOP, SANDBOX_DATA_ATTR,
    SANDBOX_ID_PREFIX, START, STOP,
};
pub use state::{into_state, State, StateChange, Updater};

// Test utilities (only available with 'testing' feature or during tests)
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryDom;
