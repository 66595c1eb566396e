#![forbid(unsafe_code)]

//! Lifecycle hook registration.
//!
//! Hooks attach to the component currently running its setup or first
//! render (see [`current_instance`](crate::current_instance)). Called
//! anywhere else they are dropped with a warning and return `false`.
//!
//! Hooks run untracked: reading reactive values inside one never makes the
//! component re-render.

use crate::component::with_current;

fn orphan(hook: &'static str) -> bool {
    tracing::warn!(message = "runtime.hook.orphan", hook);
    false
}

/// Run `f` once, after the component's first successful commit.
pub fn on_mounted(f: impl FnOnce() + 'static) -> bool {
    with_current(|instance| instance.hooks.borrow_mut().mounted.push(Box::new(f)))
        .map_or_else(|| orphan("on_mounted"), |()| true)
}

/// Run `f` after every commit except the first.
pub fn on_updated(f: impl FnMut() + 'static) -> bool {
    with_current(|instance| instance.hooks.borrow_mut().updated.push(Box::new(f)))
        .map_or_else(|| orphan("on_updated"), |()| true)
}

/// Run `f` once when the component is unmounted or torn down after a
/// failure.
pub fn on_unmounted(f: impl FnOnce() + 'static) -> bool {
    with_current(|instance| instance.hooks.borrow_mut().unmounted.push(Box::new(f)))
        .map_or_else(|| orphan("on_unmounted"), |()| true)
}
