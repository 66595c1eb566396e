#![forbid(unsafe_code)]

//! Reactive value cells.
//!
//! A [`Ref<T>`] is a shared, version-tracked value. Reading it inside a
//! tracked run (an effect or a computed getter) records a dependency edge;
//! writing a different value queues every dependent for the next flush.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per write that changes the value.
//! 2. Writing a value equal to the current one is a no-op: no version bump,
//!    nothing scheduled.
//! 3. Dropping the last handle releases the graph node and every edge to it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::runtime::{self, NodeId, NodeKind};
use crate::signal::{Readable, Writable};

struct RefInner<T> {
    id: NodeId,
    value: RefCell<T>,
    version: Cell<u64>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

/// A reactive value cell.
///
/// Cloning a `Ref` creates a new handle to the **same** value.
pub struct Ref<T> {
    inner: Rc<RefInner<T>>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: 'static> Ref<T> {
    /// Wrap `value` in a new cell.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: runtime::create_node(NodeKind::Source),
                value: RefCell::new(value),
                version: Cell::new(0),
            }),
        }
    }

    /// Borrow the value, registering a dependency on the active tracked run.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        runtime::track(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Borrow the value without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Clone the value out, registering a dependency.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Clone the value out without registering a dependency.
    #[must_use]
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    /// Store `value` and schedule dependents, unless it equals the current one.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return;
            }
            *slot = value;
        }
        self.changed();
    }

    /// Mutate the value in place. Dependents are scheduled only if the result
    /// differs from the previous value.
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: Clone + PartialEq,
    {
        let changed = {
            let mut slot = self.inner.value.borrow_mut();
            let before = slot.clone();
            f(&mut slot);
            *slot != before
        };
        if changed {
            self.changed();
        }
    }

    fn changed(&self) {
        self.inner.version.set(self.inner.version.get() + 1);
        runtime::trigger(self.inner.id);
    }

    /// Number of value changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of dependents that read this cell during their latest run.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        runtime::subscriber_count(self.inner.id)
    }

    /// Graph identity of this cell.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }
}

impl<T: 'static> Readable<T> for Ref<T> {
    fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.with(f)
    }
}

impl<T: PartialEq + 'static> Writable<T> for Ref<T> {
    fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.set(value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
