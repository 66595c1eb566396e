#![forbid(unsafe_code)]

//! Component instances.
//!
//! A component instance owns a reactive [`Scope`] and, inside it, one render
//! effect. Each run of that effect calls the render function, diffs the new
//! snapshot against the previous one and commits the edits to the host.
//! Everything the render read becomes a dependency, so a write to any of it
//! queues exactly one re-render for the next flush.
//!
//! # Lifecycle
//!
//! ```text
//! Created --first commit--> Mounted --unmount--> Unmounted
//!    |                         |
//!    +------render error-------+-----------------> Failed
//! ```
//!
//! `Unmounted` and `Failed` are terminal: the scope is disposed, the subtree
//! removed from the host and the unmounted hooks have run.
//!
//! The scope is owned by whatever owner was active at mount time. A component
//! mounted from inside another component's render belongs to that render run,
//! so the parent's next re-render (or its unmount) unmounts the child.
//!
//! # Instance stack
//!
//! While a component runs its setup and its first render, the instance is
//! pushed on a thread-local stack so lifecycle hooks and composition hooks
//! can find it. The guard pops it on exit, including on unwind.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use colibri_reactive::{EffectHandle, ReactiveError, Scope, effect, on_cleanup, untrack};
use colibri_vdom::{EditOp, HostAdapter, HostNode, Parent, Reconciler, VNodeRef, commit};

use crate::app::AppContext;
use crate::error::{RenderError, RuntimeError};
use crate::options::{ErrorHook, MountOptions};

/// Identity of a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Where a component is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Set up; first commit not done yet.
    Created,
    Mounted,
    Unmounted,
    /// A render, diff or commit failed; the component was torn down.
    Failed,
}

impl Phase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Unmounted | Self::Failed)
    }
}

/// A render function as stored by the instance.
pub(crate) type RenderFn = Box<dyn FnMut() -> Result<VNodeRef, RenderError>>;

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) mounted: Vec<Box<dyn FnOnce()>>,
    pub(crate) updated: Vec<Box<dyn FnMut()>>,
    pub(crate) unmounted: Vec<Box<dyn FnOnce()>>,
}

pub(crate) struct ComponentInstance {
    id: InstanceId,
    name: String,
    scope: Scope,
    host: Rc<RefCell<dyn HostAdapter>>,
    container: HostNode,
    reconciler: Reconciler,
    on_error: Option<ErrorHook>,
    context: Option<Rc<AppContext>>,
    phase: Cell<Phase>,
    rendering: Cell<bool>,
    renders: Cell<u64>,
    effect: Cell<Option<EffectHandle>>,
    pub(crate) hooks: RefCell<Hooks>,
    error: RefCell<Option<RuntimeError>>,
    subtree: RefCell<Option<VNodeRef>>,
}

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(1) };
    static STACK: RefCell<Vec<Rc<ComponentInstance>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps an instance on the stack for the guard's lifetime.
pub(crate) struct InstanceGuard;

impl InstanceGuard {
    pub(crate) fn push(instance: &Rc<ComponentInstance>) -> Self {
        STACK.with(|stack| stack.borrow_mut().push(Rc::clone(instance)));
        Self
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = STACK.try_with(|stack| stack.borrow_mut().pop());
    }
}

/// Run `f` against the innermost instance being set up or first rendered.
pub(crate) fn with_current<R>(f: impl FnOnce(&Rc<ComponentInstance>) -> R) -> Option<R> {
    let current = STACK.with(|stack| stack.borrow().last().cloned());
    current.map(|instance| f(&instance))
}

/// The component currently running its setup or first render, if any.
#[must_use]
pub fn current_instance() -> Option<InstanceId> {
    with_current(|instance| instance.id)
}

struct RenderingGuard<'a>(&'a Cell<bool>);

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ComponentInstance {
    pub(crate) fn new(
        host: Rc<RefCell<dyn HostAdapter>>,
        container: HostNode,
        options: MountOptions,
        context: Option<Rc<AppContext>>,
    ) -> Rc<Self> {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            InstanceId(id)
        });
        Rc::new(Self {
            id,
            name: options.name,
            scope: Scope::new(),
            host,
            container,
            reconciler: Reconciler::with_options(options.diff),
            on_error: options.on_error,
            context,
            phase: Cell::new(Phase::Created),
            rendering: Cell::new(false),
            renders: Cell::new(0),
            effect: Cell::new(None),
            hooks: RefCell::new(Hooks::default()),
            error: RefCell::new(None),
            subtree: RefCell::new(None),
        })
    }

    /// Run setup inside the instance scope and register the render effect.
    ///
    /// The first render happens immediately, unless this is called from
    /// inside a running effect; then it waits for the next flush cycle.
    pub(crate) fn start(self: &Rc<Self>, setup: impl FnOnce() -> RenderFn) {
        tracing::debug!(
            message = "runtime.mount",
            component = %self.name,
            id = %self.id,
            container = %self.container
        );
        let this = Rc::clone(self);
        self.scope.run(move || {
            let owned: Weak<Self> = Rc::downgrade(&this);
            on_cleanup(move || {
                if let Some(instance) = owned.upgrade() {
                    instance.unmount();
                }
            });
            let _current = InstanceGuard::push(&this);
            let mut render = setup();
            let runner = Rc::clone(&this);
            let handle = effect(move || runner.render_pass(&mut render));
            this.effect.set(Some(handle));
        });
    }

    fn render_pass(self: &Rc<Self>, render: &mut RenderFn) {
        if self.phase.get().is_terminal() {
            return;
        }
        if self.rendering.replace(true) {
            tracing::debug!(message = "runtime.render.reentrant", component = %self.name);
            return;
        }
        let _rendering = RenderingGuard(&self.rendering);
        let first = self.renders.get() == 0;
        let _current = first.then(|| InstanceGuard::push(self));

        let outcome = render()
            .map_err(|err| RuntimeError::from(err.in_component(&self.name)))
            .and_then(|tree| self.patch(tree));
        match outcome {
            Ok(()) => {
                self.renders.set(self.renders.get() + 1);
                if first {
                    self.phase.set(Phase::Mounted);
                    self.run_mounted_hooks();
                } else {
                    self.run_updated_hooks();
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn patch(&self, tree: VNodeRef) -> Result<(), RuntimeError> {
        let previous = self.subtree.borrow().clone();
        let ops = self
            .reconciler
            .diff(previous.as_ref(), &tree, self.container)?;
        let stats = {
            let mut host = self.host.borrow_mut();
            commit(&mut *host, ops)?
        };
        *self.subtree.borrow_mut() = Some(tree);
        tracing::debug!(
            message = "runtime.render",
            component = %self.name,
            render = self.renders.get() + 1,
            ops = stats.ops()
        );
        Ok(())
    }

    fn run_mounted_hooks(&self) {
        let hooks = std::mem::take(&mut self.hooks.borrow_mut().mounted);
        for hook in hooks {
            untrack(hook);
        }
    }

    fn run_updated_hooks(&self) {
        let mut hooks = std::mem::take(&mut self.hooks.borrow_mut().updated);
        for hook in &mut hooks {
            untrack(|| hook());
        }
        // Keep hooks registered while these ran after the existing ones.
        let mut slot = self.hooks.borrow_mut();
        hooks.append(&mut slot.updated);
        slot.updated = hooks;
    }

    fn fail(&self, err: RuntimeError) {
        self.phase.set(Phase::Failed);
        self.teardown();
        *self.error.borrow_mut() = Some(err.clone());
        match &self.on_error {
            Some(hook) => hook(&err),
            None => tracing::error!(
                message = "runtime.render_failed",
                component = %self.name,
                error = %err
            ),
        }
    }

    /// Remove the subtree, dispose the scope and run the unmounted hooks.
    fn teardown(&self) {
        let tree = self.subtree.borrow_mut().take();
        if let Some(tree) = tree.filter(|t| t.host().is_some()) {
            let remove = EditOp::Remove {
                parent: Parent::Host(self.container),
                node: tree,
            };
            let result = {
                let mut host = self.host.borrow_mut();
                commit(&mut *host, [remove])
            };
            if let Err(err) = result {
                tracing::warn!(message = "runtime.unmount.remove_failed", component = %self.name, error = %err);
            }
        }
        self.scope.dispose();
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        for hook in hooks.unmounted {
            untrack(hook);
        }
    }

    /// Tear the component down. Returns `false` if it already was.
    pub(crate) fn unmount(&self) -> bool {
        if self.phase.get().is_terminal() {
            return false;
        }
        self.phase.set(Phase::Unmounted);
        self.teardown();
        tracing::debug!(message = "runtime.unmount", component = %self.name, id = %self.id);
        true
    }

    pub(crate) fn request_render(&self) -> Result<(), ReactiveError> {
        match self.effect.get() {
            Some(handle) if !self.phase.get().is_terminal() => handle.trigger(),
            _ => Err(ReactiveError::Disposed),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn scope(&self) -> Scope {
        self.scope
    }

    pub(crate) fn container(&self) -> HostNode {
        self.container
    }

    pub(crate) fn context(&self) -> Option<&Rc<AppContext>> {
        self.context.as_ref()
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn renders(&self) -> u64 {
        self.renders.get()
    }

    pub(crate) fn error(&self) -> Option<RuntimeError> {
        self.error.borrow().clone()
    }

    pub(crate) fn subtree(&self) -> Option<VNodeRef> {
        self.subtree.borrow().clone()
    }
}
