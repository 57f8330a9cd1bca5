use std::{
    collections::VecDeque,
    fmt::{Display, Formatter},
    sync::Arc,
};

use serde_json::{Map, Value};

use super::node::{Node, NodeId, NodeKind, Variant};
use crate::{
    complex::Complex,
    config::{TreeConfig, UnknownKeyPolicy},
    diagnostic::Diagnostic,
    error::ArborError,
    registry::{NodeType, TypeRegistry, NODE, TYPES},
    shape::Shape,
    simple::format_number,
};

/// Name given to the root node of every tree.
pub const ROOT_NAME: &str = "root";

/// Controls how sparse [`Tree::serialize_with`] output is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Emit defaulted leaves, complete Complex tuples and empty collections instead of omitting
    /// them.
    pub include_defaults: bool,
}

/// Arena owning a rooted tree of [`Node`]s.
///
/// The tree is the single owner of every node; parents own their children through the child list
/// stored on each [`Node`], and removing a node drops its whole subtree. Cross references
/// ([`crate::nodelink`]) only ever store [`NodeId`]s and never extend a node's lifetime.
///
/// A tree is not internally synchronized. Callers that share one across threads must serialize
/// access to it.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    registry: TypeRegistry,
    config: TreeConfig,
    diagnostics: VecDeque<Diagnostic>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    /// A tree backed by the global [`TYPES`] registry and the default config.
    pub fn new() -> Self {
        Tree::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Tree::with_registry(TYPES.clone(), config)
    }

    pub fn with_registry(registry: TypeRegistry, config: TreeConfig) -> Self {
        let root_type = registry
            .get(NODE)
            .or_else(|| TYPES.get(NODE))
            .unwrap_or_else(|| NodeType::detached(NODE));
        let root = Node::new(ROOT_NAME.to_string(), None, root_type);
        Tree {
            nodes: vec![Some(root)],
            root: NodeId(0),
            registry,
            config,
            diagnostics: VecDeque::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ArborError> {
        self.get(id)
            .ok_or_else(|| ArborError::NotFound(format!("node {id} is not part of this tree")))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ArborError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| ArborError::NotFound(format!("node {id} is not part of this tree")))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.get(id).and_then(|node| node.child(name))
    }

    /// Navigate a `/`-separated name path below `from`. Empty segments are skipped.
    pub fn lookup(&self, from: NodeId, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(from, |current, segment| self.child(current, segment))
    }

    /// Diagnostic identity of a node: the names from the root down, joined by `/`.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = self.get(id);
        if current.is_none() {
            return format!("<removed {id}>");
        }
        while let Some(node) = current {
            names.push(node.name.as_str());
            current = node.parent.and_then(|parent| self.get(parent));
        }
        names.reverse();
        names.join("/")
    }

    /// Insert a bare node of `node_type` under `parent` and run the type's prototype over it.
    ///
    /// If the prototype fails, the partially built node is removed again and the error returned.
    pub fn instantiate(
        &mut self,
        parent: NodeId,
        name: &str,
        node_type: &Arc<NodeType>,
    ) -> Result<NodeId, ArborError> {
        let id = self.insert_node(parent, name, node_type.clone())?;
        if let Some(prototype) = node_type.prototype() {
            if let Err(e) = prototype(self, id) {
                self.drop_subtree(id);
                return Err(e);
            }
        }
        tracing::debug!(
            "[Tree::instantiate] {} as {}",
            self.path(id),
            node_type.name()
        );
        self.mark_dirty(id);
        Ok(id)
    }

    /// Instantiate the registered type `type_name` under `parent`.
    pub fn add(
        &mut self,
        parent: NodeId,
        name: &str,
        type_name: &str,
    ) -> Result<NodeId, ArborError> {
        let node_type = self.registry.require(type_name)?;
        self.instantiate(parent, name, &node_type)
    }

    /// Replace a node's variant state. Intended for prototypes that shape a freshly inserted node.
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<(), ArborError> {
        self.node_mut(id)?.kind = kind;
        self.mark_dirty(id);
        Ok(())
    }

    /// Link a bare node under `parent` without running any prototype.
    pub(crate) fn insert_node(
        &mut self,
        parent: NodeId,
        name: &str,
        node_type: Arc<NodeType>,
    ) -> Result<NodeId, ArborError> {
        if name.is_empty() {
            return Err(ArborError::Configuration(format!(
                "children of '{}' require a non-empty name",
                self.path(parent)
            )));
        }
        if self.node(parent)?.index.contains_key(name) {
            return Err(ArborError::Configuration(format!(
                "'{}' already has a child named '{name}'",
                self.path(parent)
            )));
        }
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(Some(Node::new(name.to_string(), Some(parent), node_type)));
        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(id);
        parent_node.index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Destroy a node and its entire subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ArborError> {
        if id == self.root {
            return Err(ArborError::Configuration(
                "the root node cannot be removed".to_string(),
            ));
        }
        let parent = self.node(id)?.parent;
        self.drop_subtree(id);
        if let Some(parent) = parent {
            self.renumber_indexed(parent);
            self.mark_dirty(parent);
        }
        Ok(())
    }

    /// Detach `id` from its parent and free every slot beneath it.
    pub(crate) fn drop_subtree(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        if let Some(parent) = node.parent {
            let name = node.name.clone();
            if let Ok(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|child| *child != id);
                parent_node.index.remove(&name);
            }
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
    }

    /// Clear the `updated` flag on `id` and on every ancestor, whose derived state may depend on it.
    pub fn mark_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(next) = current {
            current = match self.nodes.get_mut(next.0).and_then(Option::as_mut) {
                Some(node) => {
                    node.updated = false;
                    node.parent
                }
                None => None,
            };
        }
    }

    /// Recompute a node's derived state. Does nothing if the node is already up to date and
    /// `forced` is false.
    ///
    /// Updating is not recursive: callers are responsible for updating nested nodes.
    pub fn update(&mut self, id: NodeId, forced: bool) -> Result<(), ArborError> {
        let node = self.node(id)?;
        if node.updated && !forced {
            return Ok(());
        }
        let variant = node.kind.variant();
        if variant == Variant::Link {
            self.update_link(id)?;
        }
        self.node_mut(id)?.updated = true;
        Ok(())
    }

    /// Update `id` and every node beneath it, parents before children.
    pub fn update_subtree(&mut self, id: NodeId, forced: bool) -> Result<(), ArborError> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.update(current, forced)?;
            if let Some(node) = self.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        Ok(())
    }

    /// Read `data` into the node, dispatching on the node's variant and the input's [`Shape`].
    ///
    /// Fatal errors are returned to the caller; see [`ArborError`].
    pub fn deserialize(&mut self, id: NodeId, data: &Value) -> Result<(), ArborError> {
        let variant = self.node(id)?.kind.variant();
        match variant {
            Variant::Object => self.deserialize_object(id, data),
            Variant::Simple => self.deserialize_simple(id, data),
            Variant::Complex(complex) => self.deserialize_complex(id, complex, data),
            Variant::Set => self.deserialize_set(id, data),
            Variant::Link => self.deserialize_link(id, data),
        }
    }

    /// Generic keyed form: every key names a declared child, which reads the matching value.
    pub(crate) fn deserialize_object(
        &mut self,
        id: NodeId,
        data: &Value,
    ) -> Result<(), ArborError> {
        match Shape::of(data) {
            Shape::Null => Ok(()),
            Shape::Record(map) => self.deserialize_record(id, map),
            other => Err(self.invalid_shape(id, "an object", other)),
        }
    }

    pub(crate) fn deserialize_record(
        &mut self,
        id: NodeId,
        map: &Map<String, Value>,
    ) -> Result<(), ArborError> {
        for (key, value) in map {
            match self.child(id, key) {
                Some(child) => self.deserialize(child, value)?,
                None => self.unknown_key(id, key)?,
            }
        }
        Ok(())
    }

    /// Sparse serialization: `None` when the node holds nothing but defaults.
    pub fn serialize(&self, id: NodeId) -> Option<Value> {
        self.serialize_with(id, &SerializeOptions::default())
    }

    pub fn serialize_with(&self, id: NodeId, options: &SerializeOptions) -> Option<Value> {
        let node = self.get(id)?;
        match &node.kind {
            NodeKind::Object => self.serialize_object(node, options),
            NodeKind::Number(number) => number.serialize(options),
            NodeKind::Text(text) => text.serialize(options),
            NodeKind::Boolean(boolean) => boolean.serialize(options),
            NodeKind::Complex(complex) => self.serialize_complex(id, *complex, options),
            NodeKind::Set(set) => self.serialize_set(node, set, options),
            NodeKind::Link(link) => link.serialize(options),
        }
    }

    pub(crate) fn serialize_object(
        &self,
        node: &Node,
        options: &SerializeOptions,
    ) -> Option<Value> {
        let mut map = Map::new();
        for child in node.children.iter() {
            if let (Some(value), Some(child_node)) =
                (self.serialize_with(*child, options), self.get(*child))
            {
                map.insert(child_node.name.clone(), value);
            }
        }
        if map.is_empty() && !options.include_defaults {
            None
        } else {
            Some(Value::Object(map))
        }
    }

    /// Human readable form of a node, see [`NodeDisplay`].
    pub fn display(&self, id: NodeId) -> NodeDisplay<'_> {
        NodeDisplay { tree: self, id }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain(..).collect()
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        if self.config.max_diagnostics == 0 {
            return;
        }
        while self.diagnostics.len() >= self.config.max_diagnostics {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    /// Apply the configured [`UnknownKeyPolicy`] to an input key that names no child of `id`.
    pub(crate) fn unknown_key(&mut self, id: NodeId, key: &str) -> Result<(), ArborError> {
        match self.config.unknown_keys {
            UnknownKeyPolicy::Error => Err(ArborError::UnknownChild {
                path: self.path(id),
                key: key.to_string(),
            }),
            UnknownKeyPolicy::Warn => {
                self.report(Diagnostic::UnknownKey {
                    path: self.path(id),
                    key: key.to_string(),
                });
                Ok(())
            }
            UnknownKeyPolicy::Ignore => Ok(()),
        }
    }

    pub(crate) fn invalid_shape(&self, id: NodeId, expected: &str, found: Shape) -> ArborError {
        ArborError::InvalidShape {
            path: self.path(id),
            expected: expected.to_string(),
            found: found.describe().to_string(),
        }
    }
}

/// `Display` adapter returned by [`Tree::display`].
///
/// - Object: its path
/// - Number/String/Boolean: the value (numbers per [`format_number`])
/// - Vector: `[x, y, z]`
/// - Color: the free-text name if set, otherwise the hex form
/// - NodeSet: `name[len]`
/// - NodeLink: the comma-joined reference names
pub struct NodeDisplay<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(node) = self.tree.get(self.id) else {
            return write!(f, "<removed {}>", self.id);
        };
        match &node.kind {
            NodeKind::Object => write!(f, "{}", self.tree.path(self.id)),
            NodeKind::Number(number) => write!(f, "{}", format_number(*number.value())),
            NodeKind::Text(text) => write!(f, "{}", text.value()),
            NodeKind::Boolean(boolean) => write!(f, "{}", boolean.value()),
            NodeKind::Complex(Complex::Vector) => {
                let parts = node
                    .children
                    .iter()
                    .map(|child| self.tree.display(*child).to_string())
                    .collect::<Vec<_>>();
                write!(f, "[{}]", parts.join(", "))
            }
            NodeKind::Complex(Complex::Color) => match self.tree.color_text(self.id) {
                Some(text) => write!(f, "{text}"),
                None => match self.tree.color(self.id) {
                    Ok(rgba) => write!(f, "{}", rgba.hex()),
                    Err(_) => write!(f, "{}", self.tree.path(self.id)),
                },
            },
            NodeKind::Set(_) => write!(f, "{}[{}]", node.name, node.children.len()),
            NodeKind::Link(link) => write!(f, "{}", link.references().join(", ")),
        }
    }
}
