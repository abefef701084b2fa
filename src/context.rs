//! Context shared by a whole component tree.

use std::any::Any;
use std::rc::Rc;

use crate::component::WeakComponent;
use crate::Component;

/// An opaque value shared, never copied, by every descendant of the
/// component that provides it.
pub type Context = Rc<dyn Any>;

#[derive(Clone)]
pub(crate) enum ContextLink {
    Owned(Context),
    /// Resolved through the parent on every access.
    Inherited(WeakComponent),
}

impl Component {
    /// Provide `value` as the context of this component and its future children.
    pub fn provide_context<T: Any>(&self, value: T) {
        self.provide_context_handle(Rc::new(value));
    }

    /// Provide an already shared context, as a sandbox does for every
    /// component it starts.
    pub fn provide_context_handle(&self, context: Context) {
        self.core_mut().context = Some(ContextLink::Owned(context));
    }

    /// The context visible from this component, if any.
    pub fn context_handle(&self) -> Option<Context> {
        let link = self.core().context.clone()?;
        match link {
            ContextLink::Owned(context) => Some(context),
            ContextLink::Inherited(parent) => parent.upgrade()?.context_handle(),
        }
    }

    /// The context visible from this component, downcast to `T`.
    pub fn context<T: Any>(&self) -> Option<Rc<T>> {
        self.context_handle()?.downcast::<T>().ok()
    }

    pub(crate) fn inherit_context(&self, parent: &Component) {
        self.core_mut().context = Some(ContextLink::Inherited(parent.downgrade()));
    }
}
