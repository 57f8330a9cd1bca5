use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    sync::Arc,
};

use crate::{
    complex::Complex,
    nodelink::NodeLink,
    nodeset::NodeSet,
    registry::NodeType,
    simple::{Boolean, Number, Text},
};

/// Arena index of a node within its [`Tree`](super::Tree).
///
/// Slots are never reused, so an id whose node was removed simply stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The variant-specific state of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A plain keyed node whose content is entirely its declared children
    Object,
    Number(Number),
    Text(Text),
    Boolean(Boolean),
    /// A fixed-order tuple of leaf children (Vector, Color)
    Complex(Complex),
    Set(NodeSet),
    Link(NodeLink),
}

/// Fieldless mirror of [`NodeKind`], used to dispatch without holding a borrow on the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Object,
    Simple,
    Complex(Complex),
    Set,
    Link,
}

impl NodeKind {
    pub fn variant(&self) -> Variant {
        match self {
            NodeKind::Object => Variant::Object,
            NodeKind::Number(_) | NodeKind::Text(_) | NodeKind::Boolean(_) => Variant::Simple,
            NodeKind::Complex(complex) => Variant::Complex(*complex),
            NodeKind::Set(_) => Variant::Set,
            NodeKind::Link(_) => Variant::Link,
        }
    }
}

/// A named unit in the ownership tree.
///
/// Every node except the root sits in exactly one parent's child list, under its own name, and
/// child names are unique within a parent.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) node_type: Arc<NodeType>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) index: BTreeMap<String, NodeId>,
    pub(crate) updated: bool,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(name: String, parent: Option<NodeId>, node_type: Arc<NodeType>) -> Self {
        Node {
            name,
            parent,
            node_type,
            children: Vec::new(),
            index: BTreeMap::new(),
            updated: false,
            kind: NodeKind::Object,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    /// Children in insertion (or positional) order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Whether derived state is current. Cleared by every mutation, set only by
    /// [`Tree::update`](super::Tree::update).
    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_number(&self) -> Option<&Number> {
        match &self.kind {
            NodeKind::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&Boolean> {
        match &self.kind {
            NodeKind::Boolean(boolean) => Some(boolean),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&NodeSet> {
        match &self.kind {
            NodeKind::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&NodeLink> {
        match &self.kind {
            NodeKind::Link(link) => Some(link),
            _ => None,
        }
    }
}
