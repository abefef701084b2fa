//! Application entry point: a DOM subtree whose matching elements each get a
//! component instance.

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::TeardownFailure;
use crate::{Component, ComponentError, Constructor, Context, Element, Emitter, Host};
use crate::{OptionValue, Options, Result, State, SubscriptionId, Target};

/// Attribute stamped on the sandbox root, holding the sandbox id.
pub const SANDBOX_DATA_ATTR: &str = "data-sandbox";

/// Prefix of generated sandbox ids.
pub const SANDBOX_ID_PREFIX: &str = "_sbx-";

pub const BEFORE_START: &str = "beforeStart";
pub const START: &str = "start";
pub const BEFORE_STOP: &str = "beforeStop";
pub const STOP: &str = "stop";

fn next_sandbox_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "{SANDBOX_ID_PREFIX}{}",
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// One component type and the selector it is started on.
#[derive(Debug, Clone)]
pub struct Registration {
    component: Constructor,
    selector: Option<String>,
    options: Options,
}

impl Registration {
    /// Register `component` on the selector its logic reports from
    /// [`ComponentLogic::root`](crate::ComponentLogic::root).
    pub fn new(component: Constructor) -> Self {
        Self {
            component,
            selector: None,
            options: Options::new(),
        }
    }

    /// Override the selector of the component type.
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Constructor option applied to every started instance.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }
}

/// Configuration of a [`Sandbox`].
pub struct SandboxConfig {
    root: Target,
    id: Option<String>,
    components: Vec<Registration>,
}

impl SandboxConfig {
    pub fn new(root: impl Into<Target>) -> Self {
        Self {
            root: root.into(),
            id: None,
            components: Vec::new(),
        }
    }

    /// Use `id` instead of a generated `_sbx-<n>` id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn component(mut self, registration: Registration) -> Self {
        self.components.push(registration);
        self
    }
}

/// A registered component type with its resolved selector.
struct Entry {
    component: Constructor,
    selector: String,
    options: Options,
}

/// Bootstraps the components of an application inside one root element.
///
/// [`start`](Self::start) instantiates every registered component type on
/// each element of the root matching its selector, sharing one context
/// between all of them. [`stop`](Self::stop) tears them down again.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use futures::executor::block_on;
/// use oxide_component::{
///     ComponentLogic, Constructor, Host, MemoryDom, Registration, Sandbox, SandboxConfig,
/// };
///
/// #[derive(Default)]
/// struct Gallery;
///
/// impl ComponentLogic for Gallery {
///     fn root(&self) -> Option<&str> {
///         Some(".gallery")
///     }
/// }
///
/// let dom = Rc::new(MemoryDom::new());
/// let app = dom.append(dom.document(), "main", &[("id", "app")]);
/// dom.append(app, "div", &[("class", "gallery")]);
/// dom.append(app, "div", &[("class", "gallery")]);
///
/// let host = Host::new(dom.clone());
/// let mut sandbox = Sandbox::new(
///     &host,
///     SandboxConfig::new("#app").component(Registration::new(Constructor::of::<Gallery>())),
/// )
/// .unwrap();
///
/// sandbox.start("en-US").unwrap();
/// assert_eq!(sandbox.instances(".gallery").len(), 2);
///
/// block_on(sandbox.stop()).unwrap();
/// assert!(sandbox.instances(".gallery").is_empty());
/// ```
pub struct Sandbox {
    id: String,
    host: Host,
    root: Element,
    events: Emitter,
    registry: Vec<Entry>,
    instances: IndexMap<String, Vec<Component>>,
    context: Option<Context>,
}

impl Sandbox {
    /// Resolve the root, stamp it with the sandbox id and register the
    /// configured components.
    pub fn new(host: &Host, config: SandboxConfig) -> Result<Self> {
        let SandboxConfig {
            root,
            id,
            components,
        } = config;

        let Some(el) = root.resolve(host.dom()) else {
            return Err(ComponentError::RootNotFound {
                target: root.to_string(),
            });
        };
        let id = id.unwrap_or_else(next_sandbox_id);
        host.dom().set_attribute(el, SANDBOX_DATA_ATTR, &id);

        let mut sandbox = Self {
            id,
            host: host.clone(),
            root: el,
            events: Emitter::new(),
            registry: Vec::new(),
            instances: IndexMap::new(),
            context: None,
        };
        for registration in components {
            sandbox.register(registration)?;
        }
        debug!(id = %sandbox.id, "sandbox created");
        Ok(sandbox)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> Element {
        self.root
    }

    pub fn events(&self) -> &Emitter {
        &self.events
    }

    /// Subscribe to `beforeStart`, `start`, `beforeStop` or `stop`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&[Value]) + 'static,
    {
        self.events.on(event, handler)
    }

    /// Add a component type. It is picked up by the next [`start`](Self::start).
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        let Registration {
            component,
            selector,
            options,
        } = registration;

        let selector = selector
            .or_else(|| component.root())
            .filter(|selector| !selector.trim().is_empty())
            .ok_or_else(|| {
                ComponentError::InvalidConfig(
                    "a sandbox registration needs a non-empty selector".to_string(),
                )
            })?;

        debug!(id = %self.id, %selector, "component registered");
        self.registry.push(Entry {
            component,
            selector,
            options,
        });
        Ok(())
    }

    /// Number of registered component types.
    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    pub fn is_running(&self) -> bool {
        self.context.is_some()
    }

    /// The context shared by every started instance.
    pub fn context_handle(&self) -> Option<Context> {
        self.context.clone()
    }

    /// Instances started for `selector`, in document order.
    pub fn instances(&self, selector: &str) -> &[Component] {
        self.instances
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Instantiate every registered type on the matching elements inside the
    /// root, each mounted and initialized with an empty state.
    ///
    /// `context` becomes the context of every instance, and through them of
    /// their children.
    pub fn start<T: Any>(&mut self, context: T) -> Result<()> {
        if self.is_running() {
            warn!(id = %self.id, "sandbox already started");
            return Ok(());
        }

        let context: Context = Rc::new(context);
        self.context = Some(context.clone());
        self.events.emit(BEFORE_START, &[]);

        for entry in &self.registry {
            let elements = self.host.dom().query_all(&entry.selector, Some(self.root));
            for el in elements {
                let instance = entry.component.instantiate(&self.host, &entry.options);
                instance.provide_context_handle(context.clone());
                self.instances
                    .entry(entry.selector.clone())
                    .or_default()
                    .push(instance.clone());
                instance.mount(el, Some(State::new()))?;
            }
        }

        let started: usize = self.instances.values().map(Vec::len).sum();
        debug!(id = %self.id, started, "sandbox started");
        self.events.emit(START, &[]);
        Ok(())
    }

    /// Destroy every started instance concurrently.
    ///
    /// Every instance is released even when some fail; the failures are
    /// reported together, keyed by selector.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.events.emit(BEFORE_STOP, &[]);

        let instances: Vec<(String, Component)> = std::mem::take(&mut self.instances)
            .into_iter()
            .flat_map(|(selector, components)| {
                components
                    .into_iter()
                    .map(move |component| (selector.clone(), component))
            })
            .collect();

        let results = join_all(instances.iter().map(|(_, component)| component.destroy())).await;
        let failures: Vec<TeardownFailure> = instances
            .into_iter()
            .zip(results)
            .filter_map(|((selector, _), result)| {
                result.err().map(|source| TeardownFailure {
                    id: selector,
                    source: Box::new(source),
                })
            })
            .collect();

        self.context = None;
        debug!(id = %self.id, "sandbox stopped");
        self.events.emit(STOP, &[]);

        if failures.is_empty() {
            return Ok(());
        }
        let error = ComponentError::Teardown { failures };
        error!(id = %self.id, %error, "sandbox components failed to stop");
        Err(error)
    }
}
