#![forbid(unsafe_code)]

//! Tree model, reconciler and host commit for Colibri.
//!
//! Rendering is a three-step pipeline:
//!
//! 1. Build an immutable snapshot with [`h`], [`text`] and [`fragment`].
//! 2. [`diff`] the previous snapshot against it to get a list of
//!    [`EditOp`]s.
//! 3. [`commit`] those operations to a [`HostAdapter`].
//!
//! # Example
//!
//! ```
//! use colibri_vdom::{HostNode, Props, diff, h};
//!
//! let container = HostNode::from_raw(1);
//! let first = h("ul", Props::new(), vec![
//!     h("li", Props::new().key("a"), "A"),
//!     h("li", Props::new().key("b"), "B"),
//! ]);
//!
//! // Nothing rendered yet: one operation creates the whole tree.
//! let ops = diff(None, &first, container).unwrap();
//! assert_eq!(ops.len(), 1);
//! ```

pub mod commit;
pub mod diff;
pub mod error;
pub mod host;
pub mod vnode;

pub use commit::{CommitStats, commit};
pub use diff::{
    DiffOptions, EditKind, EditOp, Parent, Reconciler, diff, longest_increasing_subsequence,
};
pub use error::{CommitError, DiffError};
pub use host::HostAdapter;
pub use vnode::{
    Child, Event, EventHandler, HostNode, HostNodeKind, Key, PropValue, Props, VNode, VNodeKind,
    VNodeRef, fragment, h, handler_prop, keyed_fragment, normalize_children, text,
};
