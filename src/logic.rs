//! Component logic trait defining the static declaration surface and lifecycle hooks.

use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{Component, DomEvent, Options, Result, State};

/// Handler for a declared DOM listener.
pub type ListenerFn = Rc<dyn Fn(&Component, &DomEvent)>;

/// Handler for a declared state action, called with `(new, old)`.
pub type ActionFn = Rc<dyn Fn(&Component, &Value, &Value)>;

/// Readiness predicate, called with `(state, prev_state)`.
pub type ReadyStateFn = Rc<dyn Fn(&State, &State) -> bool>;

/// What a component type declares about itself.
///
/// Filled once per instance by [`ComponentLogic::declare`], right after the
/// options are layered.
#[derive(Default, Clone)]
pub struct Declarations {
    pub(crate) detached: bool,
    pub(crate) state: State,
    pub(crate) selectors: IndexMap<String, String>,
    pub(crate) listeners: Vec<(String, ListenerFn)>,
    pub(crate) actions: Vec<(String, ActionFn)>,
    pub(crate) ready_state: Option<ReadyStateFn>,
}

impl Declarations {
    /// The component has no DOM root and is initialized with `init` only.
    pub fn detached(&mut self) -> &mut Self {
        self.detached = true;
        self
    }

    /// Constructor-provided state. `init` layers its argument on top of it.
    pub fn state(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Resolve `selector` inside the root at mount and expose it under `name`.
    pub fn selector(&mut self, name: impl Into<String>, selector: impl Into<String>) -> &mut Self {
        self.selectors.insert(name.into(), selector.into());
        self
    }

    /// Bind a DOM listener at mount. `definition` is `"event[ target]"`, where
    /// the target is a CSS selector or `@name` for a declared selector.
    pub fn listener<F>(&mut self, definition: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Component, &DomEvent) + 'static,
    {
        self.listeners.push((definition.into(), Rc::new(handler)));
        self
    }

    /// Run `handler` whenever the state key `key` changes.
    pub fn action<F>(&mut self, key: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Component, &Value, &Value) + 'static,
    {
        self.actions.push((key.into(), Rc::new(handler)));
        self
    }

    /// Defer `ready` until `predicate` accepts a state transition.
    pub fn ready_state<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&State, &State) -> bool + 'static,
    {
        self.ready_state = Some(Rc::new(predicate));
        self
    }
}

/// Component logic trait: the behaviour of one component type.
///
/// Every method has a no-op default. Hooks run in this order:
/// - [`created`](Self::created) at the end of construction
/// - [`before_mount`](Self::before_mount) once the root element is attached
/// - [`initialize`](Self::initialize) during `init`, before state is seeded
/// - [`ready`](Self::ready) at the end of `init`, or once the declared
///   readiness predicate accepts a state change
/// - [`mounted`](Self::mounted) at the end of `mount`
/// - [`before_destroy`](Self::before_destroy) first thing in `destroy`
///
/// # Example
///
/// ```rust
/// use oxide_component::{Component, ComponentLogic, Declarations, Options};
/// use serde_json::json;
///
/// struct Toggle;
///
/// impl ComponentLogic for Toggle {
///     fn declare(&self, _options: &Options, declare: &mut Declarations) {
///         declare
///             .state("open", json!(false))
///             .selector("button", "button")
///             .listener("click @button", |toggle, _event| {
///                 let open = toggle.get_state("open", json!(false)) == json!(true);
///                 toggle.set_state(json!({ "open": !open }));
///             });
///     }
/// }
/// ```
pub trait ComponentLogic: 'static {
    /// Options available on every instance, before constructor overrides.
    fn default_options(&self) -> Options {
        Options::new()
    }

    fn declare(&self, _options: &Options, _declare: &mut Declarations) {}

    /// Selector a [`Sandbox`](crate::Sandbox) mounts this type on when its
    /// registration names none.
    fn root(&self) -> Option<&str> {
        None
    }

    /// Whether `set_state` should adopt `next` for `key`.
    fn should_update_state(&self, _key: &str, current: &Value, next: &Value) -> bool {
        current != next
    }

    fn created(&self, _component: &Component) {}

    fn before_mount(&self, _component: &Component) {}

    fn mounted(&self, _component: &Component) {}

    /// Runs before state and actions are wired. A good place for `set_ref`.
    fn initialize(&self, _component: &Component) {}

    fn ready(&self, _component: &Component) {}

    /// Runs before teardown while everything is still live. `destroy`
    /// suspends until the returned future settles.
    fn before_destroy(&self, _component: &Component) -> LocalBoxFuture<'static, Result<()>> {
        future::ready(Ok(())).boxed_local()
    }
}
