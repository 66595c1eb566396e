#![forbid(unsafe_code)]

//! Reactive core for Colibri.
//!
//! This crate provides dependency-tracking primitives that keep derived state
//! and side effects in sync with mutable application state:
//!
//! - [`Ref`]: a shared value cell. Reads inside a tracked run register a
//!   dependency; writes of a different value schedule dependents.
//! - [`Computed`]: a lazily-evaluated, memoized, read-only derived value.
//! - [`effect`]: a tracked function rerun after its dependencies change.
//! - [`Scope`]: an ownership group of effects disposed together.
//!
//! # Architecture
//!
//! All nodes live in a thread-local slotmap arena and reference each other by
//! [`NodeId`]. Dependency edges are rebuilt on every run, so a dependent is
//! only woken by what it read last time.
//!
//! # Scheduling
//!
//! Writes never run effects synchronously. Scheduled effects run at the next
//! [`flush`], which a host event loop calls once per turn, or when the
//! outermost [`batch`] returns. An effect triggered several times before the
//! flush runs once and observes every write.
//!
//! ```
//! use colibri_reactive::{Ref, batch, effect};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let a = Ref::new(1);
//! let b = Ref::new(2);
//! let runs = Rc::new(Cell::new(0));
//!
//! let (a2, b2, r) = (a.clone(), b.clone(), runs.clone());
//! let handle = effect(move || {
//!     let _ = a2.get() + b2.get();
//!     r.set(r.get() + 1);
//! });
//!
//! batch(|| {
//!     a.set(10);
//!     b.set(20);
//! });
//! assert_eq!(runs.get(), 2);
//! handle.stop();
//! ```

pub mod cell;
pub mod computed;
pub mod config;
pub mod effect;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod signal;

pub use cell::Ref;
pub use computed::Computed;
pub use config::ReactiveConfig;
pub use effect::{EffectHandle, deferred_effect, effect, on_cleanup};
pub use error::ReactiveError;
pub use runtime::{
    FlushStats, NodeId, NodeKind, batch, configure, current_config, flush, is_flushing, live_nodes,
    pending_effects, untrack,
};
pub use scope::Scope;
pub use signal::{Readable, Writable};
