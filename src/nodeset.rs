//! Homogeneous collections whose elements are instantiated from input data.
//!
//! A set is declared with an element [`NodeType`]. Input elements may carry a `"type"` tag naming
//! one of the element type's registered subtypes; untagged elements use the element type itself.
//!
//! The first non-null input fixes the storage mode for the lifetime of the set:
//!
//! - an array gives an [`StorageMode::Indexed`] set whose elements are named `"1"`, `"2"`, ...
//! - an object gives a [`StorageMode::Keyed`] set whose elements are named by their keys
//!
//! and serialization emits the same shape back.

use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value};

use crate::{
    diagnostic::BoundsWarning,
    error::ArborError,
    registry::{NodeType, NODE_SET},
    shape::Shape,
    tree::{Node, NodeId, NodeKind, SerializeOptions, Tree},
};

/// Input key selecting an element subtype.
pub const TYPE_KEY: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Indexed,
    Keyed,
}

impl StorageMode {
    fn shape_name(&self) -> &'static str {
        match self {
            StorageMode::Indexed => "an array",
            StorageMode::Keyed => "an object",
        }
    }
}

/// Variant state of a NodeSet node.
#[derive(Debug, Clone)]
pub struct NodeSet {
    element_type: Arc<NodeType>,
    mode: Option<StorageMode>,
}

impl NodeSet {
    pub fn element_type(&self) -> &Arc<NodeType> {
        &self.element_type
    }

    /// `None` until the first element arrives.
    pub fn mode(&self) -> Option<StorageMode> {
        self.mode
    }

    pub fn is_indexed(&self) -> bool {
        self.mode == Some(StorageMode::Indexed)
    }
}

/// Key accepted by [`Tree::element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKey<'a> {
    Name(&'a str),
    /// Zero-based position in iteration order
    Index(usize),
}

impl<'a> From<&'a str> for SetKey<'a> {
    fn from(name: &'a str) -> Self {
        SetKey::Name(name)
    }
}

impl From<usize> for SetKey<'_> {
    fn from(index: usize) -> Self {
        SetKey::Index(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetLookup {
    Found(NodeId),
    /// No element by that name
    Absent,
    /// Positional lookup past the end; also recorded as a diagnostic on the tree.
    OutOfBounds(BoundsWarning),
}

impl SetLookup {
    pub fn found(&self) -> Option<NodeId> {
        match self {
            SetLookup::Found(id) => Some(*id),
            _ => None,
        }
    }
}

/// Read-only view over a set's elements, returned by [`Tree::set`].
#[derive(Debug, Clone, Copy)]
pub struct SetView<'a> {
    tree: &'a Tree,
    node: &'a Node,
    set: &'a NodeSet,
}

impl<'a> SetView<'a> {
    pub fn len(&self) -> usize {
        self.node.children().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.children().is_empty()
    }

    pub fn is_indexed(&self) -> bool {
        self.set.is_indexed()
    }

    pub fn mode(&self) -> Option<StorageMode> {
        self.set.mode
    }

    pub fn element_type(&self) -> &'a Arc<NodeType> {
        &self.set.element_type
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        let tree = self.tree;
        self.node
            .children()
            .iter()
            .filter_map(move |child| tree.get(*child).map(Node::name))
    }

    /// Elements in insertion (or positional) order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + 'a {
        self.node.children().iter().copied()
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.node.child(name)
    }
}

pub(crate) fn set_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    Err(ArborError::Configuration(format!(
        "NodeSet '{}' requires an element type; create it with Tree::add_set",
        tree.path(id)
    )))
}

/// An input element after tag resolution, ready to be instantiated.
struct PlannedElement<'a> {
    name: String,
    element_type: Arc<NodeType>,
    body: Cow<'a, Value>,
}

impl Tree {
    /// Add a NodeSet named `name` under `parent` holding elements of `element_type`.
    pub fn add_set(
        &mut self,
        parent: NodeId,
        name: &str,
        element_type: &str,
    ) -> Result<NodeId, ArborError> {
        if element_type.is_empty() {
            return Err(ArborError::Configuration(format!(
                "NodeSet '{}/{name}' requires an element type",
                self.path(parent)
            )));
        }
        let element_type = self.registry().get(element_type).ok_or_else(|| {
            ArborError::Configuration(format!(
                "NodeSet '{}/{name}' names unregistered element type '{element_type}'",
                self.path(parent)
            ))
        })?;
        let set_type = self.registry().require(NODE_SET)?;
        let id = self.insert_node(parent, name, set_type)?;
        self.set_kind(
            id,
            NodeKind::Set(NodeSet {
                element_type,
                mode: None,
            }),
        )?;
        Ok(id)
    }

    pub fn set(&self, id: NodeId) -> Result<SetView<'_>, ArborError> {
        let node = self.node(id)?;
        match node.kind() {
            NodeKind::Set(set) => Ok(SetView {
                tree: self,
                node,
                set,
            }),
            _ => Err(self.wrong_variant(id, NODE_SET)),
        }
    }

    /// Look up an element by name or by position.
    ///
    /// A position past the end is not an error: it yields [`SetLookup::OutOfBounds`] and records
    /// the [`BoundsWarning`] in the tree's diagnostics.
    pub fn element<'k>(
        &mut self,
        id: NodeId,
        key: impl Into<SetKey<'k>>,
    ) -> Result<SetLookup, ArborError> {
        let view = self.set(id)?;
        let lookup = match key.into() {
            SetKey::Name(name) => view.get(name).map_or(SetLookup::Absent, SetLookup::Found),
            SetKey::Index(index) => match view.node.children().get(index) {
                Some(child) => SetLookup::Found(*child),
                None => SetLookup::OutOfBounds(BoundsWarning {
                    path: self.path(id),
                    index,
                    len: view.len(),
                }),
            },
        };
        if let SetLookup::OutOfBounds(warning) = &lookup {
            self.report(warning.clone().into());
        }
        Ok(lookup)
    }

    /// Create a keyed element. `tag` selects a subtype of the element type.
    pub fn insert_element(
        &mut self,
        id: NodeId,
        name: &str,
        tag: Option<&str>,
    ) -> Result<NodeId, ArborError> {
        let element_type = self.tagged_type(id, tag)?;
        self.claim_mode(id, StorageMode::Keyed)?;
        self.instantiate(id, name, &element_type)
    }

    /// Append an indexed element named by its 1-based position.
    pub fn push_element(&mut self, id: NodeId, tag: Option<&str>) -> Result<NodeId, ArborError> {
        let element_type = self.tagged_type(id, tag)?;
        self.claim_mode(id, StorageMode::Indexed)?;
        let name = (self.set(id)?.len() + 1).to_string();
        self.instantiate(id, &name, &element_type)
    }

    /// Rename the elements of an indexed set to `"1"..="n"` in order. Called after an element
    /// is removed so that names keep matching positions.
    pub(crate) fn renumber_indexed(&mut self, id: NodeId) {
        let children = match self.get(id) {
            Some(node) if node.as_set().is_some_and(NodeSet::is_indexed) => node.children.clone(),
            _ => return,
        };
        let mut index = BTreeMap::new();
        for (position, child) in children.into_iter().enumerate() {
            let name = (position + 1).to_string();
            if let Ok(node) = self.node_mut(child) {
                if node.name != name {
                    tracing::debug!("[Tree::renumber_indexed] {} -> {name}", node.name);
                    node.name = name.clone();
                }
                index.insert(name, child);
            }
        }
        if let Ok(node) = self.node_mut(id) {
            node.index = index;
        }
    }

    pub(crate) fn deserialize_set(&mut self, id: NodeId, data: &Value) -> Result<(), ArborError> {
        let (mode, entries): (StorageMode, Vec<(String, &Value)>) = match Shape::of(data) {
            Shape::Null => return Ok(()),
            Shape::List(items) => (
                StorageMode::Indexed,
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| ((i + 1).to_string(), item))
                    .collect(),
            ),
            Shape::Record(map) => (
                StorageMode::Keyed,
                map.iter().map(|(key, item)| (key.clone(), item)).collect(),
            ),
            other => return Err(self.invalid_shape(id, "an array or an object", other)),
        };
        let previous = self.set(id)?.mode();
        if let Some(current) = previous {
            if current != mode {
                return Err(self.invalid_shape(id, current.shape_name(), Shape::of(data)));
            }
        }

        // Resolve every tag before touching the tree.
        let plan = entries
            .into_iter()
            .map(|(name, item)| self.plan_element(id, name, item))
            .collect::<Result<Vec<_>, _>>()?;
        let len = plan.len();

        self.set_mode(id, Some(mode))?;
        let mut created = Vec::new();
        if let Err(e) = self.fill_set(id, plan, &mut created) {
            tracing::debug!(
                "[Tree::deserialize_set] {} failed, removing {} new elements",
                self.path(id),
                created.len()
            );
            for child in created {
                self.drop_subtree(child);
            }
            self.set_mode(id, previous)?;
            return Err(e);
        }

        if mode == StorageMode::Indexed {
            let surplus = self.set(id)?.iter().skip(len).collect::<Vec<_>>();
            if !surplus.is_empty() {
                for child in surplus {
                    self.drop_subtree(child);
                }
                self.mark_dirty(id);
            }
        }
        Ok(())
    }

    fn plan_element<'v>(
        &self,
        id: NodeId,
        name: String,
        item: &'v Value,
    ) -> Result<PlannedElement<'v>, ArborError> {
        let (tag, body) = match item {
            Value::Object(map) => match map.get(TYPE_KEY) {
                Some(Value::String(tag)) => {
                    let body: Map<String, Value> = map
                        .iter()
                        .filter(|(key, _)| key.as_str() != TYPE_KEY)
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    (Some(tag.as_str()), Cow::Owned(Value::Object(body)))
                }
                Some(other) => {
                    return Err(self.invalid_shape(id, "a string type tag", Shape::of(other)))
                }
                None => (None, Cow::Borrowed(item)),
            },
            _ => (None, Cow::Borrowed(item)),
        };
        let element_type = self.tagged_type(id, tag)?;
        if let Some(existing) = self.child(id, &name).and_then(|child| self.get(child)) {
            if !NodeType::same(existing.node_type(), &element_type) {
                return Err(ArborError::Configuration(format!(
                    "'{}/{name}' is a {} element and cannot become a {}",
                    self.path(id),
                    existing.node_type().name(),
                    element_type.name()
                )));
            }
        }
        Ok(PlannedElement {
            name,
            element_type,
            body,
        })
    }

    fn fill_set(
        &mut self,
        id: NodeId,
        plan: Vec<PlannedElement<'_>>,
        created: &mut Vec<NodeId>,
    ) -> Result<(), ArborError> {
        for element in plan {
            let child = match self.child(id, &element.name) {
                Some(child) => child,
                None => {
                    let child = self.instantiate(id, &element.name, &element.element_type)?;
                    created.push(child);
                    child
                }
            };
            self.deserialize(child, &element.body)?;
        }
        Ok(())
    }

    /// The element type, or the subtype registered under `tag`.
    fn tagged_type(&self, id: NodeId, tag: Option<&str>) -> Result<Arc<NodeType>, ArborError> {
        let base = self.set(id)?.element_type().clone();
        match tag {
            None => Ok(base),
            Some(tag) if tag == base.tag() => Ok(base),
            Some(tag) => base
                .child_by_tag(tag)
                .ok_or_else(|| ArborError::UnknownChildType {
                    path: self.path(id),
                    tag: tag.to_string(),
                }),
        }
    }

    fn claim_mode(&mut self, id: NodeId, mode: StorageMode) -> Result<(), ArborError> {
        match self.set(id)?.mode() {
            Some(current) if current != mode => Err(ArborError::Configuration(format!(
                "'{}' is {:?} and cannot take {:?} elements",
                self.path(id),
                current,
                mode
            ))),
            Some(_) => Ok(()),
            None => self.set_mode(id, Some(mode)),
        }
    }

    fn set_mode(&mut self, id: NodeId, mode: Option<StorageMode>) -> Result<(), ArborError> {
        if let NodeKind::Set(set) = &mut self.node_mut(id)?.kind {
            if set.mode != mode {
                tracing::debug!("[Tree::set_mode] {:?} -> {:?}", set.mode, mode);
                set.mode = mode;
            }
        }
        Ok(())
    }

    pub(crate) fn serialize_set(
        &self,
        node: &Node,
        set: &NodeSet,
        options: &SerializeOptions,
    ) -> Option<Value> {
        if node.children().is_empty() && !options.include_defaults {
            return None;
        }
        match set.mode.unwrap_or(StorageMode::Keyed) {
            StorageMode::Indexed => Some(Value::Array(
                node.children()
                    .iter()
                    .map(|child| {
                        self.serialize_element(*child, set, options)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            )),
            StorageMode::Keyed => {
                let map = node
                    .children()
                    .iter()
                    .filter_map(|child| {
                        let name = self.get(*child)?.name().to_string();
                        Some((name, self.serialize_element(*child, set, options)?))
                    })
                    .collect::<Map<_, _>>();
                if map.is_empty() && !options.include_defaults {
                    None
                } else {
                    Some(Value::Object(map))
                }
            }
        }
    }

    /// Serialize one element, re-emitting its type tag when it is a subtype of the element type.
    fn serialize_element(
        &self,
        child: NodeId,
        set: &NodeSet,
        options: &SerializeOptions,
    ) -> Option<Value> {
        let node = self.get(child)?;
        let value = self.serialize_with(child, options);
        if NodeType::same(node.node_type(), &set.element_type) {
            return value;
        }
        let tag = Value::String(node.node_type().tag().to_string());
        match value {
            Some(Value::Object(mut map)) => {
                map.insert(TYPE_KEY.to_string(), tag);
                Some(Value::Object(map))
            }
            None => Some(Value::Object(Map::from_iter([(TYPE_KEY.to_string(), tag)]))),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TreeConfig,
        diagnostic::Diagnostic,
        registry::{NodeTypeBuilder, TypeRegistry, NODE, NUMBER},
        simple::Number,
    };
    use serde_json::json;
    use test_log::test;

    /// `Item { a }` with a tagged subtype `Special { a, b <= 1 }`.
    fn item_tree() -> (Tree, NodeId) {
        let registry = TypeRegistry::create();
        let node = registry.get(NODE).unwrap();
        let item = registry
            .define(NodeTypeBuilder::new("Item").parent(&node).prototype(|tree, id| {
                tree.add_number(id, "a", Number::default())?;
                Ok(())
            }))
            .unwrap();
        registry
            .define(
                NodeTypeBuilder::new("Special")
                    .tag("special")
                    .parent(&item)
                    .prototype(|tree, id| {
                        tree.add_number(id, "a", Number::default())?;
                        tree.add_number(id, "b", Number::default().with_range(None, Some(1.0)))?;
                        Ok(())
                    }),
            )
            .unwrap();
        let mut tree = Tree::with_registry(registry, TreeConfig::default());
        let root = tree.root();
        let set = tree.add_set(root, "items", "Item").unwrap();
        (tree, set)
    }

    #[test]
    fn test_construction_requires_element_type() {
        let mut tree = Tree::new();
        let root = tree.root();
        assert!(matches!(
            tree.add_set(root, "empty", ""),
            Err(ArborError::Configuration(_))
        ));
        assert!(matches!(
            tree.add_set(root, "ghost", "Ghost"),
            Err(ArborError::Configuration(_))
        ));
        assert!(matches!(
            tree.add(root, "bare", NODE_SET),
            Err(ArborError::Configuration(_))
        ));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_indexed_mode() {
        let (mut tree, set) = item_tree();
        let input = json!([{"a": 1}, {"a": 2}]);
        tree.deserialize(set, &input).unwrap();

        let view = tree.set(set).unwrap();
        assert!(view.is_indexed());
        assert_eq!(view.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(tree.serialize(set), Some(input));
        assert_eq!(tree.display(set).to_string(), "items[2]");

        // Shorter input drops the surplus tail.
        tree.deserialize(set, &json!([{"a": 5}])).unwrap();
        assert_eq!(tree.serialize(set), Some(json!([{"a": 5}])));
    }

    #[test]
    fn test_keyed_mode_is_sticky() {
        let (mut tree, set) = item_tree();
        let input = json!({"x": {"a": 1}});
        tree.deserialize(set, &input).unwrap();
        assert_eq!(tree.set(set).unwrap().mode(), Some(StorageMode::Keyed));
        assert_eq!(tree.serialize(set), Some(input));

        assert!(matches!(
            tree.deserialize(set, &json!([{"a": 1}])),
            Err(ArborError::InvalidShape { .. })
        ));
        assert!(matches!(
            tree.push_element(set, None),
            Err(ArborError::Configuration(_))
        ));
    }

    #[test]
    fn test_subtype_tags() {
        let (mut tree, set) = item_tree();
        tree.deserialize(set, &json!({"x": {"type": "special", "b": 1}, "y": {"type": "item"}}))
            .unwrap();
        let x = tree.lookup(set, "x").unwrap();
        assert_eq!(tree.node(x).unwrap().node_type().name(), "Special");
        assert!(tree.node(x).unwrap().node_type().is("Item"));
        assert_eq!(
            tree.serialize(set),
            Some(json!({"x": {"type": "special", "b": 1}}))
        );
    }

    #[test]
    fn test_unknown_tag_leaves_set_untouched() {
        let (mut tree, set) = item_tree();
        let before = tree.node_count();
        let err = tree
            .deserialize(set, &json!([{"a": 1}, {"type": "nonexistent"}]))
            .unwrap_err();
        assert_eq!(
            err,
            ArborError::UnknownChildType {
                path: "root/items".to_string(),
                tag: "nonexistent".to_string()
            }
        );
        assert_eq!(tree.node_count(), before);
        assert_eq!(tree.set(set).unwrap().mode(), None);
    }

    #[test]
    fn test_failed_element_rolls_back_created_children() {
        let (mut tree, set) = item_tree();
        let before = tree.node_count();
        let err = tree
            .deserialize(set, &json!({"x": {"a": 1}, "y": {"type": "special", "b": 5}}))
            .unwrap_err();
        assert!(matches!(err, ArborError::RangeViolation { .. }));
        assert_eq!(tree.node_count(), before);
        assert!(tree.set(set).unwrap().is_empty());
        assert_eq!(tree.set(set).unwrap().mode(), None);
    }

    #[test]
    fn test_element_lookup() {
        let (mut tree, set) = item_tree();
        tree.deserialize(set, &json!([{"a": 1}, {"a": 2}])).unwrap();
        let second = tree.lookup(set, "2").unwrap();

        assert_eq!(tree.element(set, 1).unwrap(), SetLookup::Found(second));
        assert_eq!(tree.element(set, "2").unwrap(), SetLookup::Found(second));
        assert_eq!(tree.element(set, "9").unwrap(), SetLookup::Absent);

        let warning = BoundsWarning {
            path: "root/items".to_string(),
            index: 5,
            len: 2,
        };
        assert_eq!(
            tree.element(set, 5).unwrap(),
            SetLookup::OutOfBounds(warning.clone())
        );
        assert_eq!(
            tree.take_diagnostics(),
            vec![Diagnostic::BoundsWarning(warning)]
        );
    }

    #[test]
    fn test_scalar_elements() {
        let mut tree = Tree::new();
        let root = tree.root();
        let set = tree.add_set(root, "weights", NUMBER).unwrap();
        tree.deserialize(set, &json!([1, 0, 2.5])).unwrap();
        assert_eq!(tree.set(set).unwrap().len(), 3);
        // The defaulted element keeps its slot.
        assert_eq!(tree.serialize(set), Some(json!([1, null, 2.5])));
    }

    #[test]
    fn test_programmatic_elements() {
        let (mut tree, set) = item_tree();
        assert_eq!(tree.serialize(set), None);
        let first = tree.push_element(set, Some("special")).unwrap();
        tree.push_element(set, None).unwrap();
        assert_eq!(tree.node(first).unwrap().name(), "1");
        assert_eq!(
            tree.serialize(set),
            Some(json!([{"type": "special"}, null]))
        );
    }

    #[test]
    fn test_removal_keeps_positions_consistent() {
        let mut tree = Tree::new();
        let root = tree.root();
        let set = tree.add_set(root, "w", NUMBER).unwrap();
        tree.deserialize(set, &json!([1, 2, 3])).unwrap();

        let first = tree.lookup(set, "1").unwrap();
        tree.remove(first).unwrap();
        assert_eq!(tree.set(set).unwrap().keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(tree.serialize(set), Some(json!([2, 3])));
        let last = tree.lookup(set, "2").unwrap();
        assert_eq!(tree.path(last), "root/w/2");
        assert_eq!(tree.element(set, 1).unwrap(), SetLookup::Found(last));

        let pushed = tree.push_element(set, None).unwrap();
        assert_eq!(tree.node(pushed).unwrap().name(), "3");

        tree.deserialize(set, &json!([10, 20])).unwrap();
        assert_eq!(tree.set(set).unwrap().keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(tree.serialize(set), Some(json!([10, 20])));
    }

    #[test]
    fn test_keyed_removal_keeps_names() {
        let (mut tree, set) = item_tree();
        tree.deserialize(set, &json!({"x": {"a": 1}, "y": {"a": 2}}))
            .unwrap();
        let x = tree.lookup(set, "x").unwrap();
        tree.remove(x).unwrap();
        assert_eq!(tree.set(set).unwrap().keys().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(tree.serialize(set), Some(json!({"y": {"a": 2}})));
    }
}
