#![forbid(unsafe_code)]

//! Per-mount configuration.

use std::fmt;
use std::rc::Rc;

use colibri_vdom::DiffOptions;

use crate::error::RuntimeError;

/// Callback receiving a component's render, diff or commit failure.
pub type ErrorHook = Rc<dyn Fn(&RuntimeError)>;

/// Name used when a mount does not set one.
pub const DEFAULT_COMPONENT_NAME: &str = "Anonymous";

/// Options for [`mount_with`](crate::mount_with) and [`App`](crate::App).
#[derive(Clone)]
pub struct MountOptions {
    /// Component name used in logs and errors.
    pub name: String,
    /// Reconciler settings.
    pub diff: DiffOptions,
    /// Failure callback. When unset, failures are logged at error level.
    pub on_error: Option<ErrorHook>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMPONENT_NAME.to_owned(),
            diff: DiffOptions::default(),
            on_error: None,
        }
    }
}

impl fmt::Debug for MountOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountOptions")
            .field("name", &self.name)
            .field("diff", &self.diff)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl MountOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }

    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&RuntimeError) + 'static) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let options = MountOptions::new()
            .with_name("Counter")
            .with_diff(DiffOptions { checked: false })
            .on_error(|_| {});
        assert_eq!(options.name, "Counter");
        assert!(!options.diff.checked);
        assert!(options.on_error.is_some());
        assert!(format!("{options:?}").contains("Counter"));
    }

    #[test]
    fn default_name() {
        assert_eq!(MountOptions::default().name, DEFAULT_COMPONENT_NAME);
    }
}
