#![forbid(unsafe_code)]

//! The seam between the reconciler and a concrete rendered tree.

use crate::vnode::{HostNode, HostNodeKind, PropValue};

/// Operations a rendered tree must support for [`commit`](crate::commit).
///
/// `append_child` and `insert_before` receive nodes that may already be
/// attached elsewhere; implementations move them, as the DOM does.
///
/// # Fragments
///
/// A fragment is committed as a real node of kind [`HostNodeKind::Fragment`]
/// and stays one for its whole life: its children are appended to it, and it
/// is later moved or removed as a single node. Hosts with no persistent
/// fragment node (a DOM `DocumentFragment` empties on insertion) must
/// emulate one, for example with a wrapper element styled
/// `display: contents` or a pair of comment markers, so that moving or
/// removing the fragment carries its children along.
pub trait HostAdapter {
    /// Create a detached node. `tag` is empty for text and fragment nodes.
    fn create_node(&mut self, kind: HostNodeKind, tag: &str) -> HostNode;

    fn set_prop(&mut self, node: HostNode, key: &str, value: &PropValue);

    fn remove_prop(&mut self, node: HostNode, key: &str);

    fn append_child(&mut self, parent: HostNode, child: HostNode);

    /// Insert `child` immediately before `before`, a current child of `parent`.
    fn insert_before(&mut self, parent: HostNode, child: HostNode, before: HostNode);

    fn remove_child(&mut self, parent: HostNode, child: HostNode);

    fn set_text(&mut self, node: HostNode, content: &str);

    /// Resolve a container selector. Hosts without selectors return `None`.
    fn query(&self, _selector: &str) -> Option<HostNode> {
        None
    }
}

impl<H: HostAdapter + ?Sized> HostAdapter for &mut H {
    fn create_node(&mut self, kind: HostNodeKind, tag: &str) -> HostNode {
        (**self).create_node(kind, tag)
    }

    fn set_prop(&mut self, node: HostNode, key: &str, value: &PropValue) {
        (**self).set_prop(node, key, value);
    }

    fn remove_prop(&mut self, node: HostNode, key: &str) {
        (**self).remove_prop(node, key);
    }

    fn append_child(&mut self, parent: HostNode, child: HostNode) {
        (**self).append_child(parent, child);
    }

    fn insert_before(&mut self, parent: HostNode, child: HostNode, before: HostNode) {
        (**self).insert_before(parent, child, before);
    }

    fn remove_child(&mut self, parent: HostNode, child: HostNode) {
        (**self).remove_child(parent, child);
    }

    fn set_text(&mut self, node: HostNode, content: &str) {
        (**self).set_text(node, content);
    }

    fn query(&self, selector: &str) -> Option<HostNode> {
        (**self).query(selector)
    }
}
