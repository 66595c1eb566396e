#![forbid(unsafe_code)]

//! Composition hooks.
//!
//! Call these from a component's setup function. Setup runs once per mount,
//! so everything created here persists across renders and is released when
//! the component goes away.

use std::cell::{Ref as Borrow, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use colibri_reactive::{Computed, EffectHandle, Ref, deferred_effect};
use colibri_vdom::{Event, EventHandler};

use crate::component::with_current;

/// Write half of [`use_state`].
pub struct Setter<T> {
    state: Ref<T>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Setter").field(&self.state).finish()
    }
}

impl<T: Clone + PartialEq + 'static> Setter<T> {
    /// Replace the state. Equal values schedule nothing.
    pub fn set(&self, value: T) {
        self.state.set(value);
    }

    /// Mutate the state in place.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.state.update(f);
    }
}

/// Reactive state plus a setter for it.
pub fn use_state<T: Clone + PartialEq + 'static>(initial: T) -> (Ref<T>, Setter<T>) {
    let state = Ref::new(initial);
    let setter = Setter {
        state: state.clone(),
    };
    (state, setter)
}

/// A memoized value recomputed only when what it reads changes.
pub fn use_memo<T: 'static>(f: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(f)
}

/// A side effect owned by the current component.
///
/// The first run waits for the next flush, after the component's first
/// commit. The effect reruns when anything it read changes and is stopped
/// when the component unmounts. Outside a component it is unowned.
pub fn use_effect(f: impl FnMut() + 'static) -> EffectHandle {
    let Some(scope) = with_current(|instance| instance.scope()) else {
        tracing::warn!(message = "runtime.hook.orphan", hook = "use_effect");
        return deferred_effect(f);
    };
    scope.run(move || deferred_effect(f)).unwrap_or_else(|| {
        // The component is already gone; hand back a stopped effect.
        let handle = deferred_effect(|| {});
        handle.stop();
        handle
    })
}

/// A stable event handler.
///
/// Handlers compare by identity, so passing the same handler on every render
/// lets the reconciler skip the prop.
pub fn use_callback(f: impl Fn(&Event) + 'static) -> EventHandler {
    EventHandler::new(f)
}

/// A non-reactive box that persists across renders.
///
/// Writes do not schedule re-renders.
pub struct MutableRef<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableRef").field(&self.inner.borrow()).finish()
    }
}

impl<T> MutableRef<T> {
    #[must_use]
    pub fn current(&self) -> Borrow<'_, T> {
        self.inner.borrow()
    }

    #[must_use]
    pub fn current_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Store `value`, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.borrow().clone()
    }
}

pub fn use_ref<T>(initial: T) -> MutableRef<T> {
    MutableRef {
        inner: Rc::new(RefCell::new(initial)),
    }
}

/// A value provided to the application with [`App::provide`](crate::App::provide).
pub fn use_context<T: 'static>() -> Option<Rc<T>> {
    with_current(|instance| instance.context().and_then(|ctx| ctx.get::<T>())).flatten()
}
