#![forbid(unsafe_code)]

//! In-memory host tree.
//!
//! [`MemoryHost`] implements [`HostAdapter`] over a plain node table. Every
//! adapter call is appended to a journal so tests can assert exactly which
//! host mutations a render produced, and the tree can be serialized to HTML
//! for snapshot comparisons.
//!
//! Removed nodes stay in the table, detached, so stale back-references are
//! observable instead of dangling. Their event handlers are dropped.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use colibri_vdom::{Event, HostAdapter, HostNode, HostNodeKind, PropValue, handler_prop};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateNode { node: HostNode, kind: HostNodeKind },
    SetProp { node: HostNode, key: String },
    RemoveProp { node: HostNode, key: String },
    AppendChild { parent: HostNode, child: HostNode },
    InsertBefore {
        parent: HostNode,
        child: HostNode,
        before: HostNode,
    },
    RemoveChild { parent: HostNode, child: HostNode },
    SetText { node: HostNode, content: String },
}

impl HostCall {
    /// Adapter method name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateNode { .. } => "create_node",
            Self::SetProp { .. } => "set_prop",
            Self::RemoveProp { .. } => "remove_prop",
            Self::AppendChild { .. } => "append_child",
            Self::InsertBefore { .. } => "insert_before",
            Self::RemoveChild { .. } => "remove_child",
            Self::SetText { .. } => "set_text",
        }
    }

    fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Self::CreateNode { node, kind } => {
                json!({ "call": self.name(), "node": node.raw(), "kind": format!("{kind:?}") })
            }
            Self::SetProp { node, key } | Self::RemoveProp { node, key } => {
                json!({ "call": self.name(), "node": node.raw(), "key": key })
            }
            Self::AppendChild { parent, child } | Self::RemoveChild { parent, child } => {
                json!({ "call": self.name(), "parent": parent.raw(), "child": child.raw() })
            }
            Self::InsertBefore {
                parent,
                child,
                before,
            } => json!({
                "call": self.name(),
                "parent": parent.raw(),
                "child": child.raw(),
                "before": before.raw(),
            }),
            Self::SetText { node, content } => {
                json!({ "call": self.name(), "node": node.raw(), "content": content })
            }
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: HostNodeKind,
    tag: String,
    props: Vec<(String, PropValue)>,
    text: String,
    children: Vec<HostNode>,
    parent: Option<HostNode>,
    container: bool,
}

impl NodeData {
    fn new(kind: HostNodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_owned(),
            props: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            container: false,
        }
    }
}

/// A host tree held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<NodeData>,
    journal: Vec<HostCall>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for the shared handle the runtime mounts into.
    #[must_use]
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Add a root `div` with the given `id`, queryable as `#id`.
    ///
    /// Not journaled.
    pub fn create_container(&mut self, id: &str) -> HostNode {
        let mut data = NodeData::new(HostNodeKind::Element, "div");
        data.props.push(("id".to_owned(), PropValue::Str(id.to_owned())));
        data.container = true;
        self.push(data)
    }

    fn push(&mut self, data: NodeData) -> HostNode {
        self.nodes.push(data);
        HostNode::from_raw(self.nodes.len() as u64)
    }

    fn data(&self, node: HostNode) -> Option<&NodeData> {
        let index = usize::try_from(node.raw()).ok()?.checked_sub(1)?;
        self.nodes.get(index)
    }

    fn data_mut(&mut self, node: HostNode) -> Option<&mut NodeData> {
        let index = usize::try_from(node.raw()).ok()?.checked_sub(1)?;
        self.nodes.get_mut(index)
    }

    fn all(&self) -> impl Iterator<Item = (HostNode, &NodeData)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, data)| (HostNode::from_raw(i as u64 + 1), data))
    }

    fn detach(&mut self, child: HostNode) {
        let Some(parent) = self.data(child).and_then(|d| d.parent) else {
            return;
        };
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|c| *c != child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = None;
        }
    }

    /// Removed subtrees are never reattached; drop their handlers so the
    /// state they capture is released.
    fn release_handlers(&mut self, root: HostNode) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(data) = self.data_mut(node) {
                data.props
                    .retain(|(_, value)| !matches!(value, PropValue::Handler(_)));
                stack.extend(data.children.iter().copied());
            }
        }
    }

    fn attach(&mut self, parent: HostNode, child: HostNode, before: Option<HostNode>) {
        self.detach(child);
        let Some(data) = self.data_mut(parent) else {
            tracing::warn!(message = "harness.attach.unknown_parent", parent = %parent);
            return;
        };
        let at = before
            .and_then(|b| data.children.iter().position(|c| *c == b))
            .unwrap_or(data.children.len());
        data.children.insert(at, child);
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
    }

    // -- Inspection --------------------------------------------------------

    /// Recorded adapter calls, oldest first.
    #[must_use]
    pub fn journal(&self) -> &[HostCall] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Number of journaled calls to the adapter method `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.journal.iter().filter(|c| c.name() == name).count()
    }

    /// Serialize the journal as JSONL (one JSON object per line).
    #[must_use]
    pub fn journal_to_jsonl(&self) -> String {
        self.journal
            .iter()
            .map(|call| call.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total nodes ever created, containers included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn children(&self, node: HostNode) -> &[HostNode] {
        self.data(node).map_or(&[][..], |d| d.children.as_slice())
    }

    #[must_use]
    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.data(node).and_then(|d| d.parent)
    }

    #[must_use]
    pub fn kind(&self, node: HostNode) -> Option<HostNodeKind> {
        self.data(node).map(|d| d.kind)
    }

    #[must_use]
    pub fn tag(&self, node: HostNode) -> Option<&str> {
        self.data(node)
            .filter(|d| d.kind == HostNodeKind::Element)
            .map(|d| d.tag.as_str())
    }

    #[must_use]
    pub fn prop(&self, node: HostNode, key: &str) -> Option<&PropValue> {
        self.data(node)?
            .props
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Whether `node` hangs off a container.
    #[must_use]
    pub fn is_attached(&self, node: HostNode) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            match self.data(current) {
                Some(d) if d.container => return true,
                Some(d) => cursor = d.parent,
                None => return false,
            }
        }
        false
    }

    /// Concatenated text of the subtree.
    #[must_use]
    pub fn text_content(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: HostNode, out: &mut String) {
        let Some(data) = self.data(node) else { return };
        if data.kind == HostNodeKind::Text {
            out.push_str(&data.text);
        }
        for child in &data.children {
            self.collect_text(*child, out);
        }
    }

    /// HTML for `node` and its subtree. Fragments render only their
    /// children; handler props are omitted.
    #[must_use]
    pub fn to_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// HTML for the children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: HostNode, out: &mut String) {
        let Some(data) = self.data(node) else { return };
        match data.kind {
            HostNodeKind::Text => out.push_str(&escape(&data.text)),
            HostNodeKind::Fragment => {
                for child in &data.children {
                    self.write_html(*child, out);
                }
            }
            HostNodeKind::Element => {
                let _ = write!(out, "<{}", data.tag);
                for (key, value) in &data.props {
                    if let Some(attr) = value.as_attr() {
                        let _ = write!(out, " {key}=\"{}\"", escape(&attr));
                    }
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{}>", data.tag);
            }
        }
    }

    /// Stable digest of the rendered subtree, for compact golden checks.
    #[must_use]
    pub fn snapshot_digest(&self, node: HostNode) -> String {
        blake3::hash(self.to_html(node).as_bytes()).to_hex().to_string()
    }

    /// All attached nodes matching `selector`, in creation order.
    ///
    /// Supports `#id` and bare tag names.
    #[must_use]
    pub fn query_all(&self, selector: &str) -> Vec<HostNode> {
        self.all()
            .filter(|(node, data)| matches_selector(data, selector) && self.is_attached(*node))
            .map(|(node, _)| node)
            .collect()
    }

    // -- Events ------------------------------------------------------------

    /// Deliver `event` to the handler registered on its target, then flush
    /// the reactive scheduler, as a host event loop does after each event.
    ///
    /// The host is not borrowed while the handler or the flush runs, so
    /// handlers may trigger renders into the same host. Returns whether a
    /// handler was found.
    pub fn dispatch(host: &Rc<RefCell<Self>>, event: &Event) -> bool {
        let handler = {
            let host = host.borrow();
            host.prop(event.target, &handler_prop(&event.name))
                .and_then(PropValue::as_handler)
                .cloned()
        };
        let Some(handler) = handler else {
            tracing::debug!(message = "harness.dispatch.unhandled", event = %event.name);
            return false;
        };
        handler.call(event);
        colibri_reactive::flush();
        true
    }

    /// Dispatch a `click` on `target`.
    pub fn click(host: &Rc<RefCell<Self>>, target: HostNode) -> bool {
        Self::dispatch(host, &Event::new("click", target))
    }

    /// Dispatch an `input` carrying `value` on `target`.
    pub fn input(host: &Rc<RefCell<Self>>, target: HostNode, value: &str) -> bool {
        Self::dispatch(host, &Event::new("input", target).with_value(value))
    }
}

fn matches_selector(data: &NodeData, selector: &str) -> bool {
    if data.kind != HostNodeKind::Element {
        return false;
    }
    match selector.strip_prefix('#') {
        Some(id) => data
            .props
            .iter()
            .any(|(k, v)| k == "id" && matches!(v, PropValue::Str(s) if s == id)),
        None => data.tag == selector,
    }
}

fn escape(text: &str) -> String {
    v_htmlescape::escape(text).to_string()
}

impl HostAdapter for MemoryHost {
    fn create_node(&mut self, kind: HostNodeKind, tag: &str) -> HostNode {
        let node = self.push(NodeData::new(kind, tag));
        self.journal.push(HostCall::CreateNode { node, kind });
        node
    }

    fn set_prop(&mut self, node: HostNode, key: &str, value: &PropValue) {
        if let Some(data) = self.data_mut(node) {
            match data.props.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => data.props.push((key.to_owned(), value.clone())),
            }
        }
        self.journal.push(HostCall::SetProp {
            node,
            key: key.to_owned(),
        });
    }

    fn remove_prop(&mut self, node: HostNode, key: &str) {
        if let Some(data) = self.data_mut(node) {
            data.props.retain(|(k, _)| k != key);
        }
        self.journal.push(HostCall::RemoveProp {
            node,
            key: key.to_owned(),
        });
    }

    fn append_child(&mut self, parent: HostNode, child: HostNode) {
        self.attach(parent, child, None);
        self.journal.push(HostCall::AppendChild { parent, child });
    }

    fn insert_before(&mut self, parent: HostNode, child: HostNode, before: HostNode) {
        self.attach(parent, child, Some(before));
        self.journal.push(HostCall::InsertBefore {
            parent,
            child,
            before,
        });
    }

    fn remove_child(&mut self, parent: HostNode, child: HostNode) {
        if self.parent(child) == Some(parent) {
            self.detach(child);
            self.release_handlers(child);
        } else {
            tracing::warn!(message = "harness.remove.not_a_child", parent = %parent, child = %child);
        }
        self.journal.push(HostCall::RemoveChild { parent, child });
    }

    fn set_text(&mut self, node: HostNode, content: &str) {
        if let Some(data) = self.data_mut(node) {
            data.text = content.to_owned();
        }
        self.journal.push(HostCall::SetText {
            node,
            content: content.to_owned(),
        });
    }

    fn query(&self, selector: &str) -> Option<HostNode> {
        self.query_all(selector).into_iter().next()
    }
}
