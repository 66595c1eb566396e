#![forbid(unsafe_code)]

//! Runtime errors.

use colibri_vdom::{CommitError, DiffError};

/// A render function's failure.
///
/// Render closures return `Err(RenderError::new(..))`; the runtime fills in
/// the component name before reporting it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("component `{component}` failed to render: {message}")]
pub struct RenderError {
    pub component: String,
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            component: String::new(),
            message: message.into(),
        }
    }

    /// Attribute the error to `component` unless it already names one.
    #[must_use]
    pub fn in_component(mut self, component: &str) -> Self {
        if self.component.is_empty() {
            self.component = component.to_owned();
        }
        self
    }
}

/// Top-level error type for mounting and rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("mount container `{selector}` not found")]
    ContainerNotFound { selector: String },

    #[error("application is already mounted")]
    AlreadyMounted,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),
}

/// Result type alias for runtime operations.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
