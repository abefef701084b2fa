//! The component handle and its lifecycle.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::context::ContextLink;
use crate::emitter::{change_event, Emitter, SubscriptionId, CHANGE_ANY};
use crate::listeners::ListenerRegistry;
use crate::logic::{ComponentLogic, Declarations};
use crate::marker::Uid;
use crate::refs::RefEntry;
use crate::state::{StateChange, Updater};
use crate::{ComponentError, Dom, Element, Host, Options, Result, State, Target};

/// Fallback `id` prefix for initialized root elements without one.
pub const FALLBACK_ID_PREFIX: &str = "c_";

/// Lifecycle phase of a component.
///
/// Mounted components go `Created → Mounted → Active → Destroying →
/// Destroyed`; detached components skip `Mounted`. No edge leads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Mounted,
    Active,
    Destroying,
    Destroyed,
}

#[derive(Default)]
struct Readiness {
    fired: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

pub(crate) struct Core {
    pub(crate) phase: Phase,
    pub(crate) uid: Option<Uid>,
    pub(crate) active: bool,
    pub(crate) el: Option<Element>,
    pub(crate) els: IndexMap<String, Option<Element>>,
    pub(crate) state: State,
    pub(crate) refs: IndexMap<String, RefEntry>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) context: Option<ContextLink>,
    readiness: Readiness,
}

struct Inner {
    host: Host,
    logic: Box<dyn ComponentLogic>,
    options: Options,
    declarations: Declarations,
    events: Emitter,
    core: RefCell<Core>,
}

/// A component instance: one node of the composition tree.
///
/// `Component` is a cheap, reference-counted handle; clones refer to the same
/// instance. It owns an optional DOM root, keyed state, an event emitter and
/// the child references created with [`set_ref`](Self::set_ref).
///
/// Handles are not `Send`: a component tree lives on one thread and its
/// asynchronous operations are driven by a local executor.
#[derive(Clone)]
pub struct Component {
    inner: Rc<Inner>,
}

/// Non-owning handle to a [`Component`].
#[derive(Clone)]
pub struct WeakComponent(Weak<Inner>);

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|inner| Component { inner })
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Component");
        if let Ok(core) = self.inner.core.try_borrow() {
            debug
                .field("uid", &core.uid)
                .field("phase", &core.phase)
                .field("el", &core.el);
        }
        debug.finish_non_exhaustive()
    }
}

impl Component {
    /// Construct a component: layer `overrides` on the logic's default
    /// options, collect its declarations and run `created`.
    pub fn new<L: ComponentLogic>(host: &Host, logic: L, overrides: Options) -> Self {
        Self::from_boxed(host, Box::new(logic), &overrides)
    }

    pub(crate) fn from_boxed(
        host: &Host,
        logic: Box<dyn ComponentLogic>,
        overrides: &Options,
    ) -> Self {
        let options = Options::layered(logic.default_options(), overrides);
        let mut declarations = Declarations::default();
        logic.declare(&options, &mut declarations);

        let core = Core {
            phase: Phase::Created,
            uid: None,
            active: false,
            el: None,
            els: IndexMap::new(),
            state: declarations.state.clone(),
            refs: IndexMap::new(),
            listeners: ListenerRegistry::default(),
            context: None,
            readiness: Readiness::default(),
        };

        let component = Self {
            inner: Rc::new(Inner {
                host: host.clone(),
                logic,
                options,
                declarations,
                events: Emitter::new(),
                core: RefCell::new(core),
            }),
        };

        component.inner.logic.created(&component);
        component
    }

    pub fn host(&self) -> &Host {
        &self.inner.host
    }

    pub(crate) fn dom(&self) -> &dyn Dom {
        self.inner.host.dom()
    }

    pub(crate) fn core(&self) -> Ref<'_, Core> {
        self.inner.core.borrow()
    }

    pub(crate) fn core_mut(&self) -> RefMut<'_, Core> {
        self.inner.core.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Rc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn uid(&self) -> Option<Uid> {
        self.core().uid.clone()
    }

    pub fn phase(&self) -> Phase {
        self.core().phase
    }

    /// `true` from the end of `init` until a successful `destroy`.
    pub fn is_active(&self) -> bool {
        self.core().active
    }

    pub fn is_detached(&self) -> bool {
        self.inner.declarations.detached
    }

    /// The root element, once mounted.
    pub fn el(&self) -> Option<Element> {
        self.core().el
    }

    /// An element resolved at mount from a declared selector.
    pub fn element_ref(&self, name: &str) -> Option<Element> {
        self.core().els.get(name).copied().flatten()
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Invoke the callback stored under `key`, bound to this instance.
    pub fn call_option(&self, key: &str, args: &[Value]) -> Option<Value> {
        let callback = self.inner.options.callback(key)?.clone();
        Some(callback.call(self, args))
    }

    pub fn events(&self) -> &Emitter {
        &self.inner.events
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) + 'static,
    {
        self.inner.events.on(event, handler)
    }

    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.inner.events.off(event, id)
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        self.inner.events.emit(event, args);
    }

    /// Mount the component on `target` and initialize it with `state`.
    ///
    /// Pass `None` to mount without initializing. A target that does not
    /// resolve to an element is logged and leaves the component unchanged.
    pub fn mount(&self, target: impl Into<Target>, state: Option<State>) -> Result<&Self> {
        let target = target.into();
        if self.is_torn_down() {
            return Err(ComponentError::Destroyed);
        }
        if self.core().el.is_some() {
            return Err(ComponentError::AlreadyMounted);
        }
        if self.is_detached() {
            return Err(ComponentError::DetachedMount);
        }

        let Some(el) = target.resolve(self.dom()) else {
            warn!(%target, "mount target is not a DOM element");
            return Ok(self);
        };

        {
            let mut core = self.core_mut();
            core.el = Some(el);
            core.phase = Phase::Mounted;
        }
        debug!(element = el.raw(), "component mounted");

        self.inner.logic.before_mount(self);

        let els = self
            .inner
            .declarations
            .selectors
            .iter()
            .map(|(name, selector)| (name.clone(), self.dom().query(selector, Some(el))))
            .collect();
        self.core_mut().els = els;

        for (definition, handler) in &self.inner.declarations.listeners {
            let this = self.downgrade();
            let handler = handler.clone();
            self.set_listener(definition, move |event| {
                if let Some(component) = this.upgrade() {
                    handler(&component, event);
                }
            });
        }

        if let Some(state) = state {
            self.init(state)?;
        }

        self.inner.logic.mounted(self);
        Ok(self)
    }

    /// Initialize the component: assign its id, wire actions, seed the state
    /// and run `initialize` then `ready`.
    ///
    /// An element already carrying a done-marker is not initialized again;
    /// the existing id is reused and no hook runs.
    pub fn init(&self, state: State) -> Result<&Self> {
        if self.is_torn_down() {
            return Err(ComponentError::Destroyed);
        }
        let el = self.el();
        if !self.is_detached() && el.is_none() {
            return Err(ComponentError::NotMounted);
        }

        let host = self.host();
        if let Some(el) = el {
            if let Some(uid) = host.markers().lookup(host.dom(), el) {
                warn!(%uid, element = el.raw(), "element is already initialized, skipping");
                self.core_mut().uid = Some(uid);
                self.settle_ready(false);
                return Ok(self);
            }
        }

        let uid = Uid::next();
        if let Some(el) = el {
            host.markers().mark(host.dom(), el, &uid);
            if host.dom().attribute(el, "id").is_none() {
                host.dom()
                    .set_attribute(el, "id", &format!("{FALLBACK_ID_PREFIX}{uid}"));
            }
        }
        self.core_mut().uid = Some(uid.clone());

        self.inner.logic.initialize(self);

        for (key, action) in &self.inner.declarations.actions {
            let this = self.downgrade();
            let action = action.clone();
            self.on(change_event(key), move |args| {
                if let Some(component) = this.upgrade() {
                    action(&component, arg(args, 0), arg(args, 1));
                }
            });
        }

        let mut initial = self.state();
        initial.extend(state);
        self.replace_state(initial);

        {
            let mut core = self.core_mut();
            core.active = true;
            core.phase = Phase::Active;
        }
        debug!(%uid, "component initialized");

        if let Some(predicate) = self.inner.declarations.ready_state.clone() {
            self.watch_ready_state(predicate);
            return Ok(self);
        }

        self.settle_ready(true);
        Ok(self)
    }

    /// Resolves once `ready` has run.
    ///
    /// Fails with [`ComponentError::DestroyedBeforeReady`] if the component is
    /// torn down first.
    pub fn when_ready(&self) -> impl Future<Output = Result<()>> + 'static {
        let pending = {
            let mut core = self.core_mut();
            if core.readiness.fired {
                Ok(None)
            } else if core.phase == Phase::Destroyed {
                Err(ComponentError::DestroyedBeforeReady)
            } else {
                let (sender, receiver) = oneshot::channel();
                core.readiness.waiters.push(sender);
                Ok(Some(receiver))
            }
        };

        async move {
            match pending? {
                None => Ok(()),
                Some(receiver) => receiver
                    .await
                    .map_err(|_| ComponentError::DestroyedBeforeReady),
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.core().readiness.fired
    }

    fn is_torn_down(&self) -> bool {
        matches!(self.phase(), Phase::Destroying | Phase::Destroyed)
    }

    fn watch_ready_state(&self, predicate: crate::logic::ReadyStateFn) {
        let this = self.downgrade();
        let subscription: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let slot = subscription.clone();

        let id = self.on(CHANGE_ANY, move |args| {
            let current = object(arg(args, 0));
            let prev = object(arg(args, 1));
            if !predicate(&current, &prev) {
                return;
            }
            let Some(component) = this.upgrade() else {
                return;
            };
            if let Some(id) = slot.take() {
                component.off(CHANGE_ANY, id);
                component.settle_ready(true);
            }
        });
        subscription.set(Some(id));
    }

    fn settle_ready(&self, run_hook: bool) {
        let waiters = {
            let mut core = self.core_mut();
            core.readiness.fired = true;
            std::mem::take(&mut core.readiness.waiters)
        };
        if run_hook {
            trace!("component ready");
            self.inner.logic.ready(self);
        }
        for waiter in waiters {
            waiter.send(()).ok();
        }
    }

    /// Tear the component down.
    ///
    /// Awaits `before_destroy`, removes DOM listeners and event subscriptions,
    /// strips the done-marker and destroys every child reference
    /// concurrently. Teardown is one-way: a failing step is logged and
    /// reported, the remaining steps still run. Destroying an instance a
    /// second time does nothing.
    pub fn destroy(&self) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            {
                let mut core = self.core_mut();
                if matches!(core.phase, Phase::Destroying | Phase::Destroyed) {
                    debug!(uid = ?core.uid, "component already destroyed");
                    return Ok(());
                }
                core.phase = Phase::Destroying;
            }

            let hook = self.inner.logic.before_destroy(self).await;
            if let Err(error) = &hook {
                error!(%error, "before_destroy failed");
            }

            self.remove_listeners();
            self.inner.events.off_all();
            if let Some(el) = self.el() {
                self.host().markers().unmark(self.dom(), el);
            }

            let refs = self.destroy_refs().await;
            if let Err(error) = &refs {
                error!(%error, "destroy failed");
            }

            {
                let mut core = self.core_mut();
                core.phase = Phase::Destroyed;
                core.readiness.waiters.clear();
                if hook.is_ok() && refs.is_ok() {
                    core.active = false;
                }
            }
            debug!("component destroyed");

            hook.and(refs)
        }
        .boxed_local()
    }

    /// Value of `key`, or `default` when the state has no such key.
    pub fn get_state(&self, key: &str, default: Value) -> Value {
        self.core().state.get(key).cloned().unwrap_or(default)
    }

    /// A copy of the current state snapshot.
    pub fn state(&self) -> State {
        self.core().state.clone()
    }

    /// Update existing state keys and notify the changes.
    ///
    /// Keys unknown to the current state are dropped. A key changes only if
    /// [`ComponentLogic::should_update_state`] accepts the new value. Every
    /// changed key emits `change:<key>` with `(new, old)`, in reverse order of
    /// detection, followed by one `change:*` with `(state, prev_state)`.
    pub fn set_state(&self, updater: impl Into<Updater>) {
        self.apply_update(updater.into(), false);
    }

    /// Like [`set_state`](Self::set_state) without emitting events.
    pub fn set_state_silent(&self, updater: impl Into<Updater>) {
        self.apply_update(updater.into(), true);
    }

    /// Swap the whole state for `state`, notifying every key of `state`.
    pub fn replace_state(&self, state: State) {
        let change = StateChange::replace(&self.state(), state);
        self.commit(change, false);
    }

    /// Like [`replace_state`](Self::replace_state) without emitting events.
    pub fn replace_state_silent(&self, state: State) {
        let change = StateChange::replace(&self.state(), state);
        self.commit(change, true);
    }

    fn apply_update(&self, updater: Updater, silent: bool) {
        let current = self.state();
        let change_set = updater.resolve(&current);
        let logic = &self.inner.logic;
        let change = StateChange::update(&current, &change_set, |key, old, new| {
            logic.should_update_state(key, old, new)
        });
        self.commit(change, silent);
    }

    fn commit(&self, change: StateChange, silent: bool) {
        self.core_mut().state = change.next().clone();
        trace!(changed = ?change.changed_keys(), silent, "state committed");
        if !silent {
            change.emit(&self.inner.events);
        }
    }

    /// Map every element matching `selector` inside the root through `f`.
    pub fn map_elements<T, F>(&self, selector: &str, mut f: F) -> Vec<T>
    where
        F: FnMut(Element, usize) -> T,
    {
        let Some(root) = self.el() else {
            return Vec::new();
        };
        self.dom()
            .query_all(selector, Some(root))
            .into_iter()
            .enumerate()
            .map(|(index, element)| f(element, index))
            .collect()
    }
}

static NULL: Value = Value::Null;

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn object(value: &Value) -> State {
    match value {
        Value::Object(map) => map.clone(),
        _ => State::new(),
    }
}
