//! Child references: the component tree.

use std::fmt;
use std::rc::Rc;

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error};

use crate::emitter::{broadcast_event, change_event, Handler, SubscriptionId};
use crate::error::TeardownFailure;
use crate::{Component, ComponentError, ComponentLogic, Element, Host, OptionValue, Options};
use crate::{Result, State, Target};

/// Builds fresh instances of one component type.
#[derive(Clone)]
pub struct Constructor(Rc<dyn Fn() -> Box<dyn ComponentLogic>>);

impl Constructor {
    pub fn new<L, F>(make: F) -> Self
    where
        L: ComponentLogic,
        F: Fn() -> L + 'static,
    {
        Self(Rc::new(move || Box::new(make()) as Box<dyn ComponentLogic>))
    }

    /// Constructor for a logic type built with `Default`.
    pub fn of<L: ComponentLogic + Default>() -> Self {
        Self::new(L::default)
    }

    pub fn instantiate(&self, host: &Host, options: &Options) -> Component {
        Component::from_boxed(host, (self.0)(), options)
    }

    /// Default root selector of the constructed type.
    pub fn root(&self) -> Option<String> {
        (self.0)().root().map(str::to_string)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Constructor")
    }
}

/// Builds a child from the `el` of its configuration and the parent state.
#[derive(Clone)]
#[allow(clippy::type_complexity)]
pub struct Factory(Rc<dyn Fn(&Host, Option<&Target>, &State) -> Component>);

impl Factory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Host, Option<&Target>, &State) -> Component + 'static,
    {
        Self(Rc::new(f))
    }
}

/// Where a child reference comes from.
pub enum ComponentSource {
    /// A fresh instance, constructed with the configuration's options.
    Constructor(Constructor),
    /// An existing instance, used as is.
    Instance(Component),
    Factory(Factory),
}

impl From<Constructor> for ComponentSource {
    fn from(constructor: Constructor) -> Self {
        ComponentSource::Constructor(constructor)
    }
}

impl From<Component> for ComponentSource {
    fn from(component: Component) -> Self {
        ComponentSource::Instance(component)
    }
}

impl From<Factory> for ComponentSource {
    fn from(factory: Factory) -> Self {
        ComponentSource::Factory(factory)
    }
}

/// Configuration of one child reference.
///
/// # Example
///
/// ```rust
/// use oxide_component::{ComponentLogic, Constructor, RefConfig};
/// use serde_json::json;
///
/// #[derive(Default)]
/// struct Item;
/// impl ComponentLogic for Item {}
///
/// let config = RefConfig::new("first", Constructor::of::<Item>())
///     .el("#first")
///     .option("label", json!("First"))
///     .on("selected", |args| println!("selected {:?}", args));
/// # let _ = config;
/// ```
pub struct RefConfig {
    id: String,
    component: ComponentSource,
    el: Option<Target>,
    on: Vec<(String, Handler)>,
    options: Options,
}

impl RefConfig {
    pub fn new(id: impl Into<String>, component: impl Into<ComponentSource>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            el: None,
            on: Vec::new(),
            options: Options::new(),
        }
    }

    /// Root element of the child.
    pub fn el(mut self, target: impl Into<Target>) -> Self {
        self.el = Some(target.into());
        self
    }

    /// Subscribe `handler` to `event` on the child's emitter before it mounts.
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        self.on.push((event.into(), Rc::new(handler)));
        self
    }

    /// Constructor option passed to a [`ComponentSource::Constructor`] child.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }
}

/// Derives one child state key from the parent state.
pub type Binding = Rc<dyn Fn(&Value, &Component) -> Value>;

#[derive(Clone)]
pub enum Prop {
    /// Literal initial state.
    Value(Value),
    /// Recomputed whenever its parent source changes.
    Bind(Binding),
}

/// Initial child state and parent-to-child state bindings.
///
/// A bound key is either `"child_key"`, computed from the whole parent
/// state and refreshed on `change:*`, or `"parent_key>child_key"`,
/// computed from one parent key and refreshed on `change:<parent_key>`.
#[derive(Clone, Default)]
pub struct Props {
    entries: IndexMap<String, Prop>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), Prop::Value(value));
        self
    }

    pub fn bind<F>(mut self, key: impl Into<String>, binding: F) -> Self
    where
        F: Fn(&Value, &Component) -> Value + 'static,
    {
        self.entries.insert(key.into(), Prop::Bind(Rc::new(binding)));
        self
    }
}

/// Split `"parent>child"`. A missing or `*` parent means the whole state.
fn split_binding_key(name: &str) -> (Option<&str>, &str) {
    match name.split_once('>') {
        Some(("", key)) | Some(("*", key)) => (None, key),
        Some((source, key)) => (Some(source), key),
        None => (None, name),
    }
}

pub(crate) struct RefEntry {
    pub(crate) component: Component,
    /// Parent subscriptions feeding bound props into the child.
    pub(crate) subscriptions: Vec<(String, SubscriptionId)>,
}

impl Component {
    /// Attach a child component under `config.id`.
    ///
    /// A child already registered under the same id is destroyed first and
    /// its root element is swapped in place for the new one. Otherwise the
    /// new root is appended to this component's root unless already inside
    /// it. The call resolves with the child once it is ready.
    pub async fn set_ref(&self, config: RefConfig, props: Option<Props>) -> Result<Component> {
        let RefConfig {
            id,
            component: source,
            el,
            on,
            options,
        } = config;

        if id.is_empty() {
            return Err(ComponentError::InvalidConfig(
                "missing reference id".to_string(),
            ));
        }
        if el.is_some() && self.is_detached() {
            return Err(ComponentError::InvalidConfig(format!(
                "set_ref \"{id}\": a child with a DOM root cannot belong to a detached component"
            )));
        }

        let child = match source {
            ComponentSource::Constructor(constructor) => {
                constructor.instantiate(self.host(), &options)
            }
            ComponentSource::Instance(component) => component,
            ComponentSource::Factory(Factory(factory)) => {
                factory(self.host(), el.as_ref(), &self.state())
            }
        };

        if self.context_handle().is_some() {
            child.inherit_context(self);
        }

        for (event, handler) in on {
            child.events().on_handler(event, handler);
        }

        if !child.is_detached() && child.el().is_none() {
            let Some(target) = &el else {
                return Err(ComponentError::MissingRoot { id });
            };
            child.mount(target, None)?;
            // mount is silent on an unresolved target
            if child.el().is_none() {
                return Err(ComponentError::MissingRoot { id });
            }
        }

        let (state, subscriptions) = self.bind_props(&child, props);

        let prev = self.core_mut().refs.insert(
            id.clone(),
            RefEntry {
                component: child.clone(),
                subscriptions,
            },
        );

        if let Some(prev) = prev {
            self.release(&prev);
            prev.component.destroy().await?;
            self.place(&child, Some(&prev.component));
        } else {
            self.place(&child, None);
        }

        debug!(id = %id, "child reference attached");
        child.init(state)?;
        child.when_ready().await?;
        Ok(child)
    }

    /// Compute the child's initial state from `props` and subscribe the bound keys.
    fn bind_props(
        &self,
        child: &Component,
        props: Option<Props>,
    ) -> (State, Vec<(String, SubscriptionId)>) {
        let mut state = State::new();
        let mut subscriptions = Vec::new();
        let Some(props) = props else {
            return (state, subscriptions);
        };

        let parent_state = self.state();
        for (name, prop) in props.entries {
            let binding = match prop {
                Prop::Value(value) => {
                    state.insert(name, value);
                    continue;
                }
                Prop::Bind(binding) => binding,
            };

            let (source, key) = split_binding_key(&name);
            let input = match source {
                Some(source) => parent_state.get(source).cloned().unwrap_or(Value::Null),
                None => Value::Object(parent_state.clone()),
            };
            state.insert(key.to_string(), binding(&input, child));

            let event = change_event(source.unwrap_or("*"));
            let target = child.downgrade();
            let key = key.to_string();
            let subscription = self.on(event.clone(), move |args| {
                let Some(child) = target.upgrade() else {
                    return;
                };
                let input = args.first().cloned().unwrap_or(Value::Null);
                let mut update = State::new();
                update.insert(key.clone(), binding(&input, &child));
                child.set_state(update);
            });
            subscriptions.push((event, subscription));
        }

        (state, subscriptions)
    }

    /// Put the child's root in the DOM, replacing `prev`'s root when it sits inside ours.
    fn place(&self, child: &Component, prev: Option<&Component>) {
        let (Some(root), Some(child_el)) = (self.el(), child.el()) else {
            return;
        };
        let dom = self.dom();

        if let Some(prev_el) = prev.and_then(Component::el) {
            if dom.contains(root, prev_el) {
                if let Some(holder) = dom.parent(prev_el) {
                    dom.replace_child(holder, child_el, prev_el);
                    return;
                }
            }
        }

        if !dom.contains(root, child_el) {
            dom.append_child(root, child_el);
        }
    }

    fn release(&self, entry: &RefEntry) {
        for (event, subscription) in &entry.subscriptions {
            self.off(event, *subscription);
        }
    }

    /// Remove the child `id` from the tree and destroy it. With `detach`, its
    /// root element is also removed from the DOM once torn down.
    pub async fn destroy_ref(&self, id: &str, detach: bool) -> Result<()> {
        let entry = self.core_mut().refs.shift_remove(id);
        let Some(entry) = entry else {
            return Err(ComponentError::NotFound { id: id.to_string() });
        };
        self.release(&entry);
        entry.component.destroy().await?;

        if detach {
            if let Some(el) = entry.component.el() {
                if let Some(parent) = self.dom().parent(el) {
                    self.dom().remove_child(parent, el);
                }
            }
        }
        Ok(())
    }

    /// Destroy every child concurrently and empty the tree.
    ///
    /// Every child is torn down even if some fail; the failures are logged
    /// and returned together.
    pub async fn destroy_refs(&self) -> Result<()> {
        let children: Vec<(String, Component)> = self
            .core()
            .refs
            .iter()
            .map(|(id, entry)| (id.clone(), entry.component.clone()))
            .collect();
        if children.is_empty() {
            return Ok(());
        }

        let results = join_all(children.iter().map(|(_, child)| child.destroy())).await;

        let removed: Vec<RefEntry> = {
            let mut core = self.core_mut();
            children
                .iter()
                .filter_map(|(id, child)| {
                    let matches = core
                        .refs
                        .get(id)
                        .is_some_and(|entry| entry.component.ptr_eq(child));
                    if matches {
                        core.refs.shift_remove(id)
                    } else {
                        None
                    }
                })
                .collect()
        };
        for entry in &removed {
            self.release(entry);
        }

        let failures: Vec<TeardownFailure> = children
            .into_iter()
            .zip(results)
            .filter_map(|((id, _), result)| {
                result.err().map(|source| TeardownFailure {
                    id,
                    source: Box::new(source),
                })
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        let error = ComponentError::Teardown { failures };
        error!(%error, "an error occurred while destroying child components");
        Err(error)
    }

    /// Emit `broadcast:<event>` on every direct child.
    pub fn broadcast(&self, event: &str, args: &[Value]) {
        let children: Vec<Component> = self
            .core()
            .refs
            .values()
            .map(|entry| entry.component.clone())
            .collect();
        let event = broadcast_event(event);
        for child in children {
            child.emit(&event, args);
        }
    }

    /// The child registered under `id`.
    pub fn child(&self, id: &str) -> Option<Component> {
        self.core()
            .refs
            .get(id)
            .map(|entry| entry.component.clone())
    }

    /// Ids of the children, in registration order.
    pub fn child_ids(&self) -> Vec<String> {
        self.core().refs.keys().cloned().collect()
    }

    /// Root elements of the children that have one.
    pub fn child_elements(&self) -> Vec<Element> {
        self.core()
            .refs
            .values()
            .filter_map(|entry| entry.component.el())
            .collect()
    }
}
