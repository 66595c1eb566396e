#![forbid(unsafe_code)]

//! Snapshot reconciliation.
//!
//! [`Reconciler::diff`] compares two [`VNode`] snapshots and produces the
//! [`EditOp`] list that turns the host tree rendered from the old snapshot
//! into one matching the new snapshot.
//!
//! # Algorithm
//!
//! Two nodes are matched when they have the same variant, the same tag and
//! the same key (siblings without an explicit key are keyed by index).
//! Matched nodes are patched in place; anything else is removed and
//! recreated. Child lists without explicit keys are compared positionally.
//! Keyed lists skip the common prefix and suffix, map the remaining new keys
//! to positions, and keep the longest increasing run of old positions in
//! place so that only nodes outside it are moved.
//!
//! # Invariants
//!
//! 1. Identical snapshots produce no operations.
//! 2. Within one child list every `Remove` precedes every `Create`/`Move`.
//! 3. `Create` and `Move` are emitted right to left, so each `before` anchor
//!    is already in its final place when the operation is applied.
//! 4. A matched new node adopts the old node's host back-reference during
//!    the diff; no host call is needed for it.
//!
//! A [`VNodeRef`] must appear at most once per snapshot: its host
//! back-reference is a single slot. Checked mode rejects a snapshot that
//! reuses one.

use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::error::DiffError;
use crate::vnode::{HostNode, Key, PropValue, Props, VNode, VNodeKind, VNodeRef};

/// Where a created, moved or removed node lives.
#[derive(Debug, Clone)]
pub enum Parent {
    /// The mount container.
    Host(HostNode),
    /// An element or fragment of the new snapshot.
    Node(VNodeRef),
}

impl Parent {
    /// Host node for this parent, once it has been committed.
    #[must_use]
    pub fn resolve(&self) -> Option<HostNode> {
        match self {
            Self::Host(node) => Some(*node),
            Self::Node(node) => node.host(),
        }
    }
}

/// Discriminant of an [`EditOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Create,
    Remove,
    Move,
    SetProp,
    RemoveProp,
    SetText,
}

impl EditKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Move => "move",
            Self::SetProp => "set_prop",
            Self::RemoveProp => "remove_prop",
            Self::SetText => "set_text",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation of the host tree.
#[derive(Debug, Clone)]
pub enum EditOp {
    /// Build the host subtree for `node` and insert it before `before`
    /// (append when `None`).
    Create {
        parent: Parent,
        node: VNodeRef,
        before: Option<VNodeRef>,
    },
    Remove {
        parent: Parent,
        node: VNodeRef,
    },
    /// Reposition an already committed node.
    Move {
        parent: Parent,
        node: VNodeRef,
        before: Option<VNodeRef>,
    },
    SetProp {
        node: VNodeRef,
        key: String,
        value: PropValue,
    },
    RemoveProp {
        node: VNodeRef,
        key: String,
    },
    SetText {
        node: VNodeRef,
        content: String,
    },
}

impl EditOp {
    #[must_use]
    pub fn kind(&self) -> EditKind {
        match self {
            Self::Create { .. } => EditKind::Create,
            Self::Remove { .. } => EditKind::Remove,
            Self::Move { .. } => EditKind::Move,
            Self::SetProp { .. } => EditKind::SetProp,
            Self::RemoveProp { .. } => EditKind::RemoveProp,
            Self::SetText { .. } => EditKind::SetText,
        }
    }

    /// The node this operation acts on.
    #[must_use]
    pub fn node(&self) -> &VNodeRef {
        match self {
            Self::Create { node, .. }
            | Self::Remove { node, .. }
            | Self::Move { node, .. }
            | Self::SetProp { node, .. }
            | Self::RemoveProp { node, .. }
            | Self::SetText { node, .. } => node,
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Reject duplicate sibling keys instead of falling back to positional
    /// matching for that list, and reject snapshots that place one node
    /// twice.
    pub checked: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            checked: cfg!(debug_assertions),
        }
    }
}

impl DiffOptions {
    #[must_use]
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// Snapshot differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    options: DiffOptions,
}

/// Diff with default options. See [`Reconciler::diff`].
pub fn diff(
    old: Option<&VNodeRef>,
    new: &VNodeRef,
    container: HostNode,
) -> Result<Vec<EditOp>, DiffError> {
    Reconciler::default().diff(old, new, container)
}

/// Sibling identity: the explicit key, or the index for unkeyed nodes.
#[derive(PartialEq, Eq, Hash)]
enum Slot<'a> {
    Key(&'a Key),
    Index(usize),
}

fn slot(node: &VNode, index: usize) -> Slot<'_> {
    node.key().map_or(Slot::Index(index), Slot::Key)
}

fn matches(old: &[VNodeRef], oi: usize, new: &[VNodeRef], ni: usize) -> bool {
    slot(&old[oi], oi) == slot(&new[ni], ni) && old[oi].same_shape(&new[ni])
}

fn first_duplicate(list: &[VNodeRef]) -> Option<Key> {
    let mut seen = AHashSet::with_capacity(list.len());
    list.iter()
        .filter_map(|node| node.key())
        .find(|key| !seen.insert(*key))
        .cloned()
}

/// The first node reachable twice from `root`, by pointer identity.
fn first_shared(root: &VNodeRef) -> Option<&VNodeRef> {
    let mut seen: AHashSet<*const VNode> = AHashSet::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !seen.insert(Rc::as_ptr(node)) {
            return Some(node);
        }
        stack.extend(node.children());
    }
    None
}

fn describe(node: &VNode) -> String {
    match node.kind() {
        VNodeKind::Element { tag, .. } => tag.to_string(),
        VNodeKind::Text { .. } => "#text".to_owned(),
        VNodeKind::Fragment { .. } => "#fragment".to_owned(),
    }
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: DiffOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Compute the edits that turn `old` (rendered into `container`) into
    /// `new`. With no old snapshot the whole new tree is created.
    ///
    /// # Errors
    ///
    /// [`DiffError::DuplicateKey`] when checked mode finds two siblings
    /// sharing an explicit key, [`DiffError::SharedNode`] when it finds one
    /// node placed twice in `new`.
    pub fn diff(
        &self,
        old: Option<&VNodeRef>,
        new: &VNodeRef,
        container: HostNode,
    ) -> Result<Vec<EditOp>, DiffError> {
        let _span = tracing::debug_span!("vdom.diff", container = %container).entered();
        if self.options.checked
            && let Some(shared) = first_shared(new)
        {
            return Err(DiffError::SharedNode {
                node: describe(shared),
            });
        }
        let parent = Parent::Host(container);
        let mut ops = Vec::new();
        match old {
            None => ops.push(EditOp::Create {
                parent,
                node: Rc::clone(new),
                before: None,
            }),
            Some(old) => self.patch(old, new, &parent, None, &mut ops)?,
        }
        tracing::debug!(message = "vdom.diff", ops = ops.len());
        Ok(ops)
    }

    fn patch(
        &self,
        old: &VNodeRef,
        new: &VNodeRef,
        parent: &Parent,
        anchor: Option<&VNodeRef>,
        ops: &mut Vec<EditOp>,
    ) -> Result<(), DiffError> {
        if Rc::ptr_eq(old, new) {
            return Ok(());
        }
        if !old.same_shape(new) {
            ops.push(EditOp::Remove {
                parent: parent.clone(),
                node: Rc::clone(old),
            });
            ops.push(EditOp::Create {
                parent: parent.clone(),
                node: Rc::clone(new),
                before: anchor.cloned(),
            });
            return Ok(());
        }

        new.set_host(old.host());
        match (old.kind(), new.kind()) {
            (VNodeKind::Text { content: before }, VNodeKind::Text { content: after }) => {
                if before != after {
                    ops.push(EditOp::SetText {
                        node: Rc::clone(new),
                        content: after.clone(),
                    });
                }
            }
            (
                VNodeKind::Element {
                    props: old_props,
                    children: old_children,
                    ..
                },
                VNodeKind::Element {
                    props: new_props,
                    children: new_children,
                    ..
                },
            ) => {
                diff_props(old_props, new_props, new, ops);
                let parent = Parent::Node(Rc::clone(new));
                self.diff_children(old_children, new_children, &parent, ops)?;
            }
            (
                VNodeKind::Fragment {
                    children: old_children,
                },
                VNodeKind::Fragment {
                    children: new_children,
                },
            ) => {
                let parent = Parent::Node(Rc::clone(new));
                self.diff_children(old_children, new_children, &parent, ops)?;
            }
            // same_shape rules out mixed variants.
            _ => {}
        }
        Ok(())
    }

    fn diff_children(
        &self,
        old: &[VNodeRef],
        new: &[VNodeRef],
        parent: &Parent,
        ops: &mut Vec<EditOp>,
    ) -> Result<(), DiffError> {
        let keyed = old.iter().chain(new).any(|node| node.key().is_some());
        if !keyed {
            return self.diff_positional(old, new, parent, ops);
        }
        if let Some(key) = first_duplicate(old).or_else(|| first_duplicate(new)) {
            if self.options.checked {
                return Err(DiffError::DuplicateKey { key });
            }
            tracing::warn!(message = "vdom.diff.duplicate_key", key = %key);
            return self.diff_positional(old, new, parent, ops);
        }
        self.diff_keyed(old, new, parent, ops)
    }

    fn diff_positional(
        &self,
        old: &[VNodeRef],
        new: &[VNodeRef],
        parent: &Parent,
        ops: &mut Vec<EditOp>,
    ) -> Result<(), DiffError> {
        let common = old.len().min(new.len());
        for node in &old[common..] {
            ops.push(EditOp::Remove {
                parent: parent.clone(),
                node: Rc::clone(node),
            });
        }
        for node in &new[common..] {
            ops.push(EditOp::Create {
                parent: parent.clone(),
                node: Rc::clone(node),
                before: None,
            });
        }
        for i in (0..common).rev() {
            self.patch(&old[i], &new[i], parent, new.get(i + 1), ops)?;
        }
        Ok(())
    }

    fn diff_keyed(
        &self,
        old: &[VNodeRef],
        new: &[VNodeRef],
        parent: &Parent,
        ops: &mut Vec<EditOp>,
    ) -> Result<(), DiffError> {
        let mut start = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        while start < old_end && start < new_end && matches(old, start, new, start) {
            self.patch(&old[start], &new[start], parent, None, ops)?;
            start += 1;
        }
        while old_end > start && new_end > start && matches(old, old_end - 1, new, new_end - 1) {
            old_end -= 1;
            new_end -= 1;
            self.patch(&old[old_end], &new[new_end], parent, None, ops)?;
        }

        if start == old_end {
            let before = new.get(new_end);
            for node in &new[start..new_end] {
                ops.push(EditOp::Create {
                    parent: parent.clone(),
                    node: Rc::clone(node),
                    before: before.cloned(),
                });
            }
            return Ok(());
        }
        if start == new_end {
            for node in &old[start..old_end] {
                ops.push(EditOp::Remove {
                    parent: parent.clone(),
                    node: Rc::clone(node),
                });
            }
            return Ok(());
        }

        let span = new_end - start;
        let mut positions: AHashMap<Slot<'_>, usize> = AHashMap::with_capacity(span);
        for (offset, node) in new[start..new_end].iter().enumerate() {
            positions.insert(slot(node, start + offset), offset);
        }

        // sources[offset] is the old index matched to new[start + offset].
        let mut sources: Vec<Option<usize>> = vec![None; span];
        let mut stale: SmallVec<[&VNodeRef; 8]> = SmallVec::new();
        for (oi, node) in old.iter().enumerate().take(old_end).skip(start) {
            match positions.get(&slot(node, oi)) {
                Some(&offset) if node.same_shape(&new[start + offset]) => {
                    sources[offset] = Some(oi);
                }
                _ => stale.push(node),
            }
        }

        for node in stale {
            ops.push(EditOp::Remove {
                parent: parent.clone(),
                node: Rc::clone(node),
            });
        }
        for (offset, source) in sources.iter().enumerate() {
            if let Some(oi) = *source {
                self.patch(&old[oi], &new[start + offset], parent, None, ops)?;
            }
        }

        let stable = longest_increasing_subsequence(&sources);
        for offset in (0..span).rev() {
            let index = start + offset;
            let node = Rc::clone(&new[index]);
            let before = new.get(index + 1).cloned();
            match sources[offset] {
                None => ops.push(EditOp::Create {
                    parent: parent.clone(),
                    node,
                    before,
                }),
                Some(_) if !stable[offset] => ops.push(EditOp::Move {
                    parent: parent.clone(),
                    node,
                    before,
                }),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn diff_props(old: &Props, new: &Props, node: &VNodeRef, ops: &mut Vec<EditOp>) {
    for (name, value) in new.iter() {
        if old.get(name) != Some(value) {
            ops.push(EditOp::SetProp {
                node: Rc::clone(node),
                key: name.to_owned(),
                value: value.clone(),
            });
        }
    }
    for (name, _) in old.iter() {
        if new.get(name).is_none() {
            ops.push(EditOp::RemoveProp {
                node: Rc::clone(node),
                key: name.to_owned(),
            });
        }
    }
}

/// Mark one longest strictly increasing subsequence of the `Some` entries.
///
/// Returns a flag per position; `None` entries are never marked. Runs in
/// O(n log n).
#[must_use]
pub fn longest_increasing_subsequence(seq: &[Option<usize>]) -> Vec<bool> {
    // (value, position) of the smallest tail for each run length.
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (pos, value) in seq.iter().enumerate() {
        let Some(value) = *value else { continue };
        let at = tails.partition_point(|&(v, _)| v < value);
        if at > 0 {
            prev[pos] = Some(tails[at - 1].1);
        }
        if at == tails.len() {
            tails.push((value, pos));
        } else {
            tails[at] = (value, pos);
        }
    }

    let mut stable = vec![false; seq.len()];
    let mut cursor = tails.last().map(|&(_, pos)| pos);
    while let Some(pos) = cursor {
        stable[pos] = true;
        cursor = prev[pos];
    }
    stable
}
