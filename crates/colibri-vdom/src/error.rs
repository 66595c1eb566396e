#![forbid(unsafe_code)]

//! Reconciler and commit errors.

use crate::vnode::Key;

/// Failure to produce an edit list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// Two siblings in one child list share an explicit key.
    #[error("duplicate sibling key {key}")]
    DuplicateKey { key: Key },
    /// One `VNodeRef` appears twice in a snapshot; its single host
    /// back-reference cannot track both placements.
    #[error("node <{node}> appears more than once in one snapshot")]
    SharedNode { node: String },
}

/// Failure to apply an edit list to a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// An operation referenced a node that has no host back-reference yet.
    #[error("{op} references a node that was never committed")]
    Detached { op: &'static str },
}
