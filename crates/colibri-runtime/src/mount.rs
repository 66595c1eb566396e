#![forbid(unsafe_code)]

//! Mounting render functions into a host container.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use colibri_reactive::ReactiveError;
use colibri_vdom::{HostAdapter, HostNode, VNodeRef};

use crate::app::AppContext;
use crate::component::{ComponentInstance, InstanceId, Phase, RenderFn};
use crate::error::{RenderError, RuntimeError};
use crate::options::MountOptions;

/// Handle to a mounted component.
///
/// Dropping the handle does not unmount: the component stays live until
/// [`unmount`](Self::unmount) is called or it fails.
#[derive(Clone)]
pub struct MountHandle {
    instance: Rc<ComponentInstance>,
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("id", &self.instance.id())
            .field("name", &self.instance.name())
            .field("phase", &self.instance.phase())
            .field("renders", &self.instance.renders())
            .finish()
    }
}

impl MountHandle {
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.instance.name()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.instance.phase()
    }

    /// Whether the component has committed and not been torn down.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.instance.phase() == Phase::Mounted
    }

    /// The failure that tore the component down, if any.
    #[must_use]
    pub fn error(&self) -> Option<RuntimeError> {
        self.instance.error()
    }

    /// Successful commits so far.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.instance.renders()
    }

    /// The last committed snapshot.
    #[must_use]
    pub fn subtree(&self) -> Option<VNodeRef> {
        self.instance.subtree()
    }

    #[must_use]
    pub fn container(&self) -> HostNode {
        self.instance.container()
    }

    /// Queue a re-render for the next flush, for state the render reads
    /// outside the reactive graph.
    pub fn request_render(&self) -> Result<(), ReactiveError> {
        self.instance.request_render()
    }

    /// Stop every effect of the component, remove its subtree from the
    /// container and run its unmounted hooks. Idempotent.
    pub fn unmount(&self) {
        self.instance.unmount();
    }
}

/// Mount `render` into `container`. See [`mount_with`].
pub fn mount<H, R>(host: Rc<RefCell<H>>, container: HostNode, render: R) -> MountHandle
where
    H: HostAdapter + 'static,
    R: FnMut() -> Result<VNodeRef, RenderError> + 'static,
{
    mount_with(host, container, MountOptions::default(), render)
}

/// Mount `render` into `container` with explicit options.
///
/// The first render and commit happen before this returns, unless it is
/// called from inside a running effect; then they happen on the next flush
/// cycle. Failures do not surface here: they tear the component down and
/// are available from [`MountHandle::error`].
pub fn mount_with<H, R>(
    host: Rc<RefCell<H>>,
    container: HostNode,
    options: MountOptions,
    render: R,
) -> MountHandle
where
    H: HostAdapter + 'static,
    R: FnMut() -> Result<VNodeRef, RenderError> + 'static,
{
    mount_component(host, container, options, move || render)
}

/// Mount a component written as a setup function.
///
/// `setup` runs once, with the component as the current instance, and
/// returns the render function. State, memos, effects and lifecycle hooks
/// created in `setup` live as long as the component.
pub fn mount_component<H, S, R>(
    host: Rc<RefCell<H>>,
    container: HostNode,
    options: MountOptions,
    setup: S,
) -> MountHandle
where
    H: HostAdapter + 'static,
    S: FnOnce() -> R,
    R: FnMut() -> Result<VNodeRef, RenderError> + 'static,
{
    spawn(host, container, options, None, setup)
}

pub(crate) fn spawn<H, S, R>(
    host: Rc<RefCell<H>>,
    container: HostNode,
    options: MountOptions,
    context: Option<Rc<AppContext>>,
    setup: S,
) -> MountHandle
where
    H: HostAdapter + 'static,
    S: FnOnce() -> R,
    R: FnMut() -> Result<VNodeRef, RenderError> + 'static,
{
    let host: Rc<RefCell<dyn HostAdapter>> = host;
    let instance = ComponentInstance::new(host, container, options, context);
    instance.start(move || Box::new(setup()) as RenderFn);
    MountHandle { instance }
}
