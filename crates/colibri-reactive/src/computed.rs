#![forbid(unsafe_code)]

//! Lazy computed values that track their own dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a getter and its cached result in shared,
//! reference-counted storage. The getter runs inside a tracked context, so
//! every [`Ref`](crate::Ref) or other `Computed` it reads becomes a dependency
//! for that run only. When any dependency changes, the cached value is
//! invalidated (marked dirty) and dependents of the `Computed` are notified.
//! The next read recomputes and caches the result.
//!
//! # Invariants
//!
//! 1. A read never returns a stale value once a dependency write completes.
//! 2. The getter runs at most once per dependency change cycle (memoization).
//! 3. If no dependency has changed, a read returns the cached value.
//! 4. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Getter panics**: the cached value remains from the last successful
//!   computation. The dirty flag stays set so the next read retries.
//! - **Getter reads itself**: a dependency cycle. The value is still dirty
//!   during its own recomputation, so the read recurses without bound.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::runtime::{self, NodeId, NodeKind};
use crate::signal::{Readable, Writable};

struct ComputedInner<T> {
    id: NodeId,
    getter: Box<dyn Fn() -> T>,
    /// Cached result (None only before first computation).
    cached: RefCell<Option<T>>,
    version: Cell<u64>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

/// A lazily-evaluated, memoized, read-only derived value.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &runtime::is_dirty(self.inner.id))
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: 'static> Computed<T> {
    /// Create a computed value. The getter does not run until the first read.
    #[must_use]
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(ComputedInner {
                id: runtime::create_node(NodeKind::Derived),
                getter: Box::new(getter),
                cached: RefCell::new(None),
                version: Cell::new(0),
            }),
        }
    }

    fn refresh(&self) {
        let stale = runtime::is_dirty(self.inner.id) || self.inner.cached.borrow().is_none();
        if stale {
            let value = runtime::recompute(self.inner.id, || (self.inner.getter)());
            *self.inner.cached.borrow_mut() = Some(value);
            self.inner.version.set(self.inner.version.get() + 1);
        }
    }

    /// Access the current value by reference, recomputing first if dirty.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        runtime::track(self.inner.id);
        let cached = self.inner.cached.borrow();
        f(cached.as_ref().expect("cached is always Some after refresh"))
    }

    /// Get a clone of the current value, recomputing first if dirty.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Computed values cannot be assigned.
    ///
    /// Always returns [`ReactiveError::ReadOnly`]; the cache is untouched.
    pub fn set(&self, _value: T) -> Result<(), ReactiveError> {
        tracing::warn!(message = "reactive.computed.write", computed = ?self.inner.id);
        Err(ReactiveError::ReadOnly)
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        runtime::is_dirty(self.inner.id)
    }

    /// Force invalidation of the cached value and notify dependents.
    pub fn invalidate(&self) {
        runtime::invalidate(self.inner.id);
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of dependencies read during the latest recomputation.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        runtime::source_count(self.inner.id)
    }

    /// Graph identity of this value.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }
}

impl<T: 'static> Readable<T> for Computed<T> {
    fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.with(f)
    }
}

impl<T: 'static> Writable<T> for Computed<T> {
    fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.set(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
