#![forbid(unsafe_code)]

//! Application shell and plugins.
//!
//! An [`App`] wraps a root component's setup function with the
//! configuration shared by every mount of it: options, installed plugins and
//! values provided to components through [`use_context`](crate::use_context).

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use colibri_vdom::{HostAdapter, VNodeRef};

use crate::component::RenderFn;
use crate::error::{RenderError, RuntimeError};
use crate::mount::{MountHandle, spawn};
use crate::options::MountOptions;

/// Values provided to every component of one app.
#[derive(Default)]
pub(crate) struct AppContext {
    provided: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
}

impl AppContext {
    fn insert<T: 'static>(&self, value: T) -> Option<Rc<dyn Any>> {
        self.provided
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(value))
    }

    pub(crate) fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let value = self.provided.borrow().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }

    fn len(&self) -> usize {
        self.provided.borrow().len()
    }
}

/// An extension installed into an [`App`].
pub trait Plugin {
    /// Unique name; a plugin is installed at most once per app.
    fn name(&self) -> &str;

    fn install(&self, app: &mut App);
}

type Setup = Rc<dyn Fn() -> RenderFn>;

/// A root component plus app-wide configuration.
pub struct App {
    setup: Setup,
    options: MountOptions,
    context: Rc<AppContext>,
    plugins: Vec<String>,
    handle: Option<MountHandle>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("options", &self.options)
            .field("plugins", &self.plugins)
            .field("provided", &self.context.len())
            .field("handle", &self.handle)
            .finish()
    }
}

impl App {
    /// Create an app from a setup function returning the render function.
    ///
    /// Setup runs once per mount.
    pub fn new<S, R>(setup: S) -> Self
    where
        S: Fn() -> R + 'static,
        R: FnMut() -> Result<VNodeRef, RenderError> + 'static,
    {
        Self {
            setup: Rc::new(move || Box::new(setup()) as RenderFn),
            options: MountOptions::default(),
            context: Rc::new(AppContext::default()),
            plugins: Vec::new(),
            handle: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: MountOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut MountOptions {
        &mut self.options
    }

    /// Install `plugin` unless one with the same name already is.
    pub fn use_plugin(&mut self, plugin: impl Plugin) -> &mut Self {
        let name = plugin.name().to_owned();
        if self.plugins.contains(&name) {
            tracing::debug!(message = "runtime.plugin.duplicate", plugin = %name);
            return self;
        }
        self.plugins.push(name.clone());
        plugin.install(self);
        tracing::debug!(message = "runtime.plugin.install", plugin = %name);
        self
    }

    /// Names of installed plugins, in installation order.
    #[must_use]
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Make `value` available to components via `use_context::<T>()`.
    /// Providing the same type again replaces the earlier value.
    pub fn provide<T: 'static>(&mut self, value: T) -> &mut Self {
        if self.context.insert(value).is_some() {
            tracing::debug!(message = "runtime.provide.replaced", ty = std::any::type_name::<T>());
        }
        self
    }

    /// A provided value, if any.
    #[must_use]
    pub fn injected<T: 'static>(&self) -> Option<Rc<T>> {
        self.context.get::<T>()
    }

    /// Mount the root component into the container matching `selector`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ContainerNotFound`] if the host resolves no
    ///   container; the app stays unmounted.
    /// - [`RuntimeError::AlreadyMounted`] if a previous mount is still live.
    /// - The first render's failure, if it ran and failed synchronously.
    pub fn mount<H>(&mut self, host: Rc<RefCell<H>>, selector: &str) -> Result<MountHandle, RuntimeError>
    where
        H: HostAdapter + 'static,
    {
        if self.is_mounted() {
            return Err(RuntimeError::AlreadyMounted);
        }
        let container = host.borrow().query(selector);
        let Some(container) = container else {
            tracing::warn!(message = "runtime.mount.no_container", selector);
            return Err(RuntimeError::ContainerNotFound {
                selector: selector.to_owned(),
            });
        };

        let setup = Rc::clone(&self.setup);
        let handle = spawn(
            host,
            container,
            self.options.clone(),
            Some(Rc::clone(&self.context)),
            move || setup(),
        );
        if let Some(err) = handle.error() {
            return Err(err);
        }
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Unmount the live mount, if any.
    pub fn unmount(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.unmount();
        }
    }

    /// Whether a mount is live (created or mounted, not torn down).
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.phase().is_terminal())
    }

    #[must_use]
    pub fn handle(&self) -> Option<&MountHandle> {
        self.handle.as_ref()
    }

    /// Framework version.
    #[must_use]
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
