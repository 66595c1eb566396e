#![forbid(unsafe_code)]

//! Applying edit lists to a host.

use crate::diff::EditOp;
use crate::error::CommitError;
use crate::host::HostAdapter;
use crate::vnode::{HostNode, HostNodeKind, VNodeKind, VNodeRef};

/// Counters for one [`commit`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// `Create` operations applied.
    pub created: usize,
    /// Host nodes built by those operations, descendants included.
    pub nodes_built: usize,
    pub removed: usize,
    pub moved: usize,
    /// `SetProp` and `RemoveProp` operations applied.
    pub props: usize,
    pub texts: usize,
}

impl CommitStats {
    /// Total operations applied.
    #[must_use]
    pub fn ops(&self) -> usize {
        self.created + self.removed + self.moved + self.props + self.texts
    }
}

/// Apply `ops` to `host` in order.
///
/// Created nodes get their host back-reference set, so later operations in
/// the same list (and the next diff) can address them.
///
/// # Errors
///
/// [`CommitError::Detached`] when an operation refers to a node, parent or
/// anchor that has no host back-reference. Operations before the failing
/// one stay applied.
pub fn commit<H>(
    host: &mut H,
    ops: impl IntoIterator<Item = EditOp>,
) -> Result<CommitStats, CommitError>
where
    H: HostAdapter + ?Sized,
{
    let _span = tracing::debug_span!("vdom.commit").entered();
    let mut stats = CommitStats::default();
    for op in ops {
        apply(host, op, &mut stats)?;
    }
    tracing::debug!(
        message = "vdom.commit",
        created = stats.created,
        removed = stats.removed,
        moved = stats.moved,
        props = stats.props,
        texts = stats.texts,
    );
    Ok(stats)
}

fn apply<H>(host: &mut H, op: EditOp, stats: &mut CommitStats) -> Result<(), CommitError>
where
    H: HostAdapter + ?Sized,
{
    let name = op.kind().as_str();
    let detached = || CommitError::Detached { op: name };
    match op {
        EditOp::Create {
            parent,
            node,
            before,
        } => {
            let parent = parent.resolve().ok_or_else(detached)?;
            let before = before.map(|b| b.host().ok_or_else(detached)).transpose()?;
            let built = build(host, &node, &mut stats.nodes_built);
            place(host, parent, built, before);
            stats.created += 1;
        }
        EditOp::Remove { parent, node } => {
            let parent = parent.resolve().ok_or_else(detached)?;
            let child = node.host().ok_or_else(detached)?;
            host.remove_child(parent, child);
            stats.removed += 1;
        }
        EditOp::Move {
            parent,
            node,
            before,
        } => {
            let parent = parent.resolve().ok_or_else(detached)?;
            let child = node.host().ok_or_else(detached)?;
            let before = before.map(|b| b.host().ok_or_else(detached)).transpose()?;
            place(host, parent, child, before);
            stats.moved += 1;
        }
        EditOp::SetProp { node, key, value } => {
            let target = node.host().ok_or_else(detached)?;
            host.set_prop(target, &key, &value);
            stats.props += 1;
        }
        EditOp::RemoveProp { node, key } => {
            let target = node.host().ok_or_else(detached)?;
            host.remove_prop(target, &key);
            stats.props += 1;
        }
        EditOp::SetText { node, content } => {
            let target = node.host().ok_or_else(detached)?;
            host.set_text(target, &content);
            stats.texts += 1;
        }
    }
    Ok(())
}

fn place<H>(host: &mut H, parent: HostNode, child: HostNode, before: Option<HostNode>)
where
    H: HostAdapter + ?Sized,
{
    match before {
        Some(anchor) => host.insert_before(parent, child, anchor),
        None => host.append_child(parent, child),
    }
}

/// Build the detached host subtree for `node`, recording back-references.
fn build<H>(host: &mut H, node: &VNodeRef, built: &mut usize) -> HostNode
where
    H: HostAdapter + ?Sized,
{
    let created = match node.kind() {
        VNodeKind::Element {
            tag,
            props,
            children,
        } => {
            let el = host.create_node(HostNodeKind::Element, tag);
            for (key, value) in props.iter() {
                host.set_prop(el, key, value);
            }
            for child in children {
                let child = build(host, child, built);
                host.append_child(el, child);
            }
            el
        }
        VNodeKind::Text { content } => {
            let el = host.create_node(HostNodeKind::Text, "");
            host.set_text(el, content);
            el
        }
        VNodeKind::Fragment { children } => {
            let el = host.create_node(HostNodeKind::Fragment, "");
            for child in children {
                let child = build(host, child, built);
                host.append_child(el, child);
            }
            el
        }
    };
    node.set_host(Some(created));
    *built += 1;
    created
}
