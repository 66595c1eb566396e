#![forbid(unsafe_code)]

//! Ownership groups for effects.
//!
//! Effects registered while a [`Scope`] runs are owned by it, and disposing
//! the scope stops all of them (and any nested scopes) at once. A scope
//! created while an effect runs is itself owned by that effect.

use crate::runtime::{self, NodeId, OwnerGuard};

/// A disposable group of effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope {
    id: NodeId,
}

impl Scope {
    /// Create a scope under the current owner, if any.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: runtime::create_scope(),
        }
    }

    /// Run `f` with this scope as the owner of new effects.
    ///
    /// Returns `None` without calling `f` if the scope was disposed.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !runtime::contains(self.id) {
            return None;
        }
        let _guard = OwnerGuard::push(self.id);
        Some(f())
    }

    /// Stop every owned effect and run the scope's cleanups. Idempotent.
    pub fn dispose(&self) {
        if runtime::dispose(self.id) {
            tracing::debug!(message = "reactive.scope.dispose", scope = ?self.id);
        }
    }

    /// Whether the scope has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.id)
    }

    /// Graph identity of this scope.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
