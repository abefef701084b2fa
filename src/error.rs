//! Error types surfaced by component operations.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ComponentError> = core::result::Result<T, E>;

/// Errors raised by lifecycle, state and child-reference operations.
///
/// Precondition violations (wiring bugs) are reported through this type.
/// Soft conditions such as an unresolved mount target are logged and never
/// turned into errors.
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("component is already mounted")]
    AlreadyMounted,

    #[error("a detached component cannot be mounted, use `init` instead")]
    DetachedMount,

    #[error("component instance not mounted")]
    NotMounted,

    #[error("component has been destroyed")]
    Destroyed,

    #[error("sandbox root \"{target}\" is not a DOM element")]
    RootNotFound { target: String },

    #[error("invalid reference configuration: {0}")]
    InvalidConfig(String),

    #[error("a root element is required for the child component with id \"{id}\"")]
    MissingRoot { id: String },

    #[error("child component \"{id}\" not found")]
    NotFound { id: String },

    #[error("{} child component(s) failed to tear down", .failures.len())]
    Teardown { failures: Vec<TeardownFailure> },

    #[error("component was destroyed before becoming ready")]
    DestroyedBeforeReady,

    #[error("{0}")]
    Hook(String),
}

impl ComponentError {
    /// Build an error from a user hook (`before_destroy` and friends).
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}

/// One child that failed during a fan-out teardown.
#[derive(Error, Debug)]
#[error("child \"{id}\": {source}")]
pub struct TeardownFailure {
    pub id: String,
    #[source]
    pub source: Box<ComponentError>,
}
