#![forbid(unsafe_code)]

//! Lightweight tree descriptions.
//!
//! A [`VNode`] is an immutable description of one node of the rendered tree:
//! an element with a tag, props and children, a run of text, or a fragment
//! that groups children without a tag of its own. Snapshots are built fresh
//! on every render with [`h`], [`text`] and [`fragment`] and shared through
//! [`VNodeRef`].
//!
//! The only mutable part of a node is its host back-reference, the
//! [`HostNode`] it produced when it was committed. The reconciler carries
//! that reference from a matched old node to its new counterpart, so later
//! edits can address the host tree without a lookup.
//!
//! # Child normalization
//!
//! Children are passed as anything convertible into [`Child`]:
//!
//! - strings and numbers become [`VNodeKind::Text`] nodes;
//! - `None`, `false`, `true` and `()` are dropped;
//! - a nested sequence is flattened into its parent list, one level deep;
//! - sequences nested deeper than that become fragments.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Opaque identity of a node owned by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    /// Wrap a raw host identifier.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw host identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of host node requested from an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostNodeKind {
    Element,
    Text,
    /// Transparent grouping node.
    Fragment,
}

/// Explicit sibling identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

/// An event delivered by the host to a handler prop.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix, e.g. `click`.
    pub name: String,
    /// Host node the event was dispatched on.
    pub target: HostNode,
    /// Payload for value-carrying events such as `input`.
    pub value: Option<String>,
}

impl Event {
    #[must_use]
    pub fn new(name: impl Into<String>, target: HostNode) -> Self {
        Self {
            name: name.into(),
            target,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Shared event callback. Two handlers are equal only if they are the same
/// allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// Value of a single prop.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    /// Text rendering used by hosts that store attributes as strings.
    /// Handlers have none.
    #[must_use]
    pub fn as_attr(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(x) => Some(x.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Handler(_) => None,
        }
    }

    #[must_use]
    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        Self::Handler(value)
    }
}

/// Ordered prop list with an optional lifted key.
///
/// Setting a name twice replaces the earlier value in place, so hosts see
/// props in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: Vec<(String, PropValue)>,
    key: Option<Key>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prop. A `key` name is lifted into the node key instead.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "key" {
            self.key = match value {
                PropValue::Str(s) => Some(Key::Str(s)),
                PropValue::Int(n) => Some(Key::Int(n)),
                other => other.as_attr().map(Key::Str),
            };
            return self;
        }
        self.insert(name, value);
        self
    }

    /// Attach an event handler under `on<event>`.
    #[must_use]
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.insert(handler_prop(event), PropValue::Handler(EventHandler::new(handler)));
        self
    }

    /// Attach an existing handler, keeping its identity.
    #[must_use]
    pub fn on_handler(mut self, event: &str, handler: EventHandler) -> Self {
        self.insert(handler_prop(event), PropValue::Handler(handler));
        self
    }

    /// Set the sibling key.
    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn insert(&mut self, name: String, value: PropValue) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

/// Prop name under which a handler for `event` is stored.
#[must_use]
pub fn handler_prop(event: &str) -> String {
    format!("on{event}")
}

/// Shape of a [`VNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum VNodeKind {
    Element {
        tag: String,
        props: Props,
        children: Vec<VNodeRef>,
    },
    Text {
        content: String,
    },
    Fragment {
        children: Vec<VNodeRef>,
    },
}

/// Shared handle to a node in a snapshot.
pub type VNodeRef = Rc<VNode>;

/// One node of a tree snapshot.
#[derive(Debug, Clone)]
pub struct VNode {
    kind: VNodeKind,
    key: Option<Key>,
    host: Cell<Option<HostNode>>,
}

impl PartialEq for VNode {
    /// Structural equality; host back-references are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.kind == other.kind
    }
}

impl VNode {
    #[must_use]
    pub fn new(kind: VNodeKind, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            host: Cell::new(None),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &VNodeKind {
        &self.kind
    }

    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Element tag, if this is an element.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    #[must_use]
    pub fn props(&self) -> Option<&Props> {
        match &self.kind {
            VNodeKind::Element { props, .. } => Some(props),
            _ => None,
        }
    }

    /// Text content, if this is a text node.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            VNodeKind::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Children of an element or fragment; empty for text.
    #[must_use]
    pub fn children(&self) -> &[VNodeRef] {
        match &self.kind {
            VNodeKind::Element { children, .. } | VNodeKind::Fragment { children } => children,
            VNodeKind::Text { .. } => &[],
        }
    }

    #[must_use]
    pub fn host_kind(&self) -> HostNodeKind {
        match self.kind {
            VNodeKind::Element { .. } => HostNodeKind::Element,
            VNodeKind::Text { .. } => HostNodeKind::Text,
            VNodeKind::Fragment { .. } => HostNodeKind::Fragment,
        }
    }

    /// Host node produced for this VNode, once committed.
    #[must_use]
    pub fn host(&self) -> Option<HostNode> {
        self.host.get()
    }

    pub(crate) fn set_host(&self, host: Option<HostNode>) {
        self.host.set(host);
    }

    /// Same variant, same tag and same explicit key.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        if self.key != other.key {
            return false;
        }
        match (&self.kind, &other.kind) {
            (VNodeKind::Element { tag: a, .. }, VNodeKind::Element { tag: b, .. }) => a == b,
            (VNodeKind::Text { .. }, VNodeKind::Text { .. })
            | (VNodeKind::Fragment { .. }, VNodeKind::Fragment { .. }) => true,
            _ => false,
        }
    }

    /// Number of nodes in this subtree, including itself.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(|c| c.subtree_len())
            .sum::<usize>()
    }
}

/// Anything that can appear in a children list.
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNodeRef),
    Text(String),
    Many(Vec<Child>),
    Empty,
}

impl From<VNodeRef> for Child {
    fn from(value: VNodeRef) -> Self {
        Self::Node(value)
    }
}

impl From<&VNodeRef> for Child {
    fn from(value: &VNodeRef) -> Self {
        Self::Node(Rc::clone(value))
    }
}

impl From<VNode> for Child {
    fn from(value: VNode) -> Self {
        Self::Node(Rc::new(value))
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Child {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

macro_rules! child_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Child {
            fn from(value: $t) -> Self {
                Self::Text(value.to_string())
            }
        })*
    };
}

child_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl From<()> for Child {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(value: Vec<T>) -> Self {
        Self::Many(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Child>, const N: usize> From<[T; N]> for Child {
    fn from(value: [T; N]) -> Self {
        Self::Many(value.into_iter().map(Into::into).collect())
    }
}

/// Normalize a children argument into a flat list.
#[must_use]
pub fn normalize_children(children: impl Into<Child>) -> Vec<VNodeRef> {
    let mut out = Vec::new();
    push_child(children.into(), 0, &mut out);
    out
}

// depth 0 is the argument itself, depth 1 its items; a sequence found at
// depth 2 or below is wrapped in a fragment.
fn push_child(child: Child, depth: usize, out: &mut Vec<VNodeRef>) {
    match child {
        Child::Node(node) => out.push(node),
        Child::Text(content) => out.push(text(content)),
        Child::Empty => {}
        Child::Many(items) if depth < 2 => {
            for item in items {
                push_child(item, depth + 1, out);
            }
        }
        Child::Many(items) => out.push(fragment(items)),
    }
}

/// Build an element node.
pub fn h(tag: impl Into<String>, props: Props, children: impl Into<Child>) -> VNodeRef {
    let Props { entries, key } = props;
    Rc::new(VNode::new(
        VNodeKind::Element {
            tag: tag.into(),
            props: Props { entries, key: None },
            children: normalize_children(children),
        },
        key,
    ))
}

/// Build a text node.
pub fn text(content: impl Into<String>) -> VNodeRef {
    Rc::new(VNode::new(
        VNodeKind::Text {
            content: content.into(),
        },
        None,
    ))
}

/// Build a fragment node.
pub fn fragment(children: impl Into<Child>) -> VNodeRef {
    Rc::new(VNode::new(
        VNodeKind::Fragment {
            children: normalize_children(children),
        },
        None,
    ))
}

/// Build a keyed fragment node.
pub fn keyed_fragment(key: impl Into<Key>, children: impl Into<Child>) -> VNodeRef {
    Rc::new(VNode::new(
        VNodeKind::Fragment {
            children: normalize_children(children),
        },
        Some(key.into()),
    ))
}
