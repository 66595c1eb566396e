#![forbid(unsafe_code)]

//! Tracked side-effecting functions.
//!
//! An effect runs its body inside a tracked context and is queued for the
//! next flush whenever something it read changes. Before every rerun the
//! effect drops all of its previous dependency edges, disposes the effects it
//! created during the previous run, and runs the cleanups registered with
//! [`on_cleanup`]. Dependencies behind a branch that is no longer taken stop
//! waking it up.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::runtime::{self, NodeId, RunFn};

/// Handle to a registered effect.
///
/// The handle does not keep the effect alive: an effect lives until it is
/// stopped or its owner is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    id: NodeId,
}

impl EffectHandle {
    /// Stop the effect: drop its edges, dispose what it owns, run its
    /// cleanups. A run already waiting in the queue is skipped.
    ///
    /// Idempotent.
    pub fn stop(&self) {
        if runtime::dispose(self.id) {
            tracing::debug!(message = "reactive.effect.stop", effect = ?self.id);
        }
    }

    /// Whether the effect has been stopped (directly or through its owner).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.id)
    }

    /// Queue the effect for the next flush as if a dependency changed.
    pub fn trigger(&self) -> Result<(), ReactiveError> {
        if runtime::schedule(self.id) {
            Ok(())
        } else {
            Err(ReactiveError::Disposed)
        }
    }

    /// Graph identity of this effect.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

fn boxed(f: impl FnMut() + 'static) -> RunFn {
    Rc::new(RefCell::new(f))
}

/// Register an effect and run it once now.
///
/// When registered while another effect is running (for example during a
/// component render), the first run is deferred to the next flush cycle and
/// the new effect is owned by the running one.
pub fn effect(f: impl FnMut() + 'static) -> EffectHandle {
    EffectHandle {
        id: runtime::create_effect(boxed(f), false),
    }
}

/// Register an effect whose first run waits for the next flush.
pub fn deferred_effect(f: impl FnMut() + 'static) -> EffectHandle {
    EffectHandle {
        id: runtime::create_effect(boxed(f), true),
    }
}

/// Register `f` to run before the current effect reruns or when the current
/// effect or scope is disposed.
///
/// Returns `false` (and drops `f`) when called outside any effect or scope.
pub fn on_cleanup(f: impl FnOnce() + 'static) -> bool {
    let registered = runtime::add_cleanup(Box::new(f));
    if !registered {
        tracing::warn!(message = "reactive.cleanup.orphan");
    }
    registered
}
