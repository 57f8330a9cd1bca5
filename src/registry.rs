// Node type registry
//
// Node types describe the runtime variants a tree can hold: their serialization tag, their
// supertype, and the prototype that builds a fresh instance. Types are registered once at startup,
// globally through `TYPES` or in a private `TypeRegistry`, and are never removed.

use crate::{
    complex::{color_prototype, vector_prototype},
    error::ArborError,
    nodelink::link_prototype,
    nodeset::set_prototype,
    simple::{boolean_prototype, number_prototype, text_prototype},
    tree::{NodeId, Tree},
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Write},
    sync::{Arc, Weak},
};

/// Global singleton type registry with the built-in node types
pub static TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::create);

pub const NODE: &str = "Node";
pub const SIMPLE: &str = "Simple";
pub const NUMBER: &str = "Number";
pub const STRING: &str = "String";
pub const BOOLEAN: &str = "Boolean";
pub const COMPLEX: &str = "Complex";
pub const VECTOR: &str = "Vector";
pub const COLOR: &str = "Color";
pub const NODE_SET: &str = "NodeSet";
pub const NODE_LINK: &str = "NodeLink";

/// Builds the structure of a freshly inserted node: sets its [`NodeKind`](crate::tree::NodeKind)
/// and adds its declared children.
pub type Prototype = Arc<dyn Fn(&mut Tree, NodeId) -> Result<(), ArborError> + Send + Sync>;

/// Immutable descriptor of a node variant.
///
/// A type holds a strong reference to its supertype. Subtypes are tracked weakly by tag and by
/// name; the owning [`TypeRegistry`] keeps them alive.
pub struct NodeType {
    name: String,
    tag: String,
    parent: Option<Arc<NodeType>>,
    prototype: Option<Prototype>,
    children: RwLock<BTreeMap<String, Weak<NodeType>>>,
    child_tags: RwLock<BTreeMap<String, Weak<NodeType>>>,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<&Arc<NodeType>> {
        self.parent.as_ref()
    }

    /// Iterate over this type followed by each of its supertypes.
    pub fn ancestors(&self) -> impl Iterator<Item = &NodeType> {
        std::iter::successors(Some(self), |ty| ty.parent.as_deref())
    }

    /// Whether `type_name` names this type or any supertype.
    pub fn is(&self, type_name: &str) -> bool {
        self.ancestors().any(|ty| ty.name == type_name)
    }

    /// The directly declared subtype registered under `tag`.
    pub fn child_by_tag(&self, tag: &str) -> Option<Arc<NodeType>> {
        self.child_tags.read().get(tag).and_then(Weak::upgrade)
    }

    pub fn child_tags(&self) -> Vec<String> {
        self.child_tags.read().keys().cloned().collect()
    }

    /// Directly declared subtypes, ordered by name.
    pub fn children(&self) -> Vec<Arc<NodeType>> {
        self.children
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// The nearest prototype on the ancestor chain. Subtypes without their own prototype build
    /// the same structure as their supertype.
    pub fn prototype(&self) -> Option<Prototype> {
        self.ancestors().find_map(|ty| ty.prototype.clone())
    }

    /// A parentless type outside any registry, used for tree roots when the registry lacks one.
    pub(crate) fn detached(name: &str) -> Arc<NodeType> {
        Arc::new(NodeType {
            name: name.to_string(),
            tag: name.to_lowercase(),
            parent: None,
            prototype: None,
            children: RwLock::new(BTreeMap::new()),
            child_tags: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn same(a: &Arc<NodeType>, b: &Arc<NodeType>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

impl Debug for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("child_tags", &self.child_tags())
            .finish()
    }
}

/// Describes a type to [`TypeRegistry::define`].
pub struct NodeTypeBuilder {
    name: String,
    tag: Option<String>,
    parent: Option<Arc<NodeType>>,
    prototype: Option<Prototype>,
}

impl NodeTypeBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        NodeTypeBuilder {
            name: name.into(),
            tag: None,
            parent: None,
            prototype: None,
        }
    }

    /// Serialization discriminator. Defaults to the lower-cased name.
    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn parent(mut self, parent: &Arc<NodeType>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn prototype<F>(mut self, prototype: F) -> Self
    where
        F: Fn(&mut Tree, NodeId) -> Result<(), ArborError> + Send + Sync + 'static,
    {
        self.prototype = Some(Arc::new(prototype));
        self
    }
}

/// Thread-safe registry of node types, keyed by type name.
///
/// Pattern matches a schema registry: clones share the same underlying map, and the global
/// instance is [`TYPES`].
pub struct TypeRegistry(Arc<RwLock<BTreeMap<String, Arc<NodeType>>>>);

impl Clone for TypeRegistry {
    fn clone(&self) -> Self {
        TypeRegistry(self.0.clone())
    }
}

impl Debug for TypeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypeRegistry").field(&self.names()).finish()
    }
}

impl TypeRegistry {
    /// An empty registry. Most callers want [`TypeRegistry::create`].
    pub fn empty() -> Self {
        TypeRegistry(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// Create registry with the built-in node types
    pub fn create() -> Self {
        let registry = TypeRegistry::empty();
        if let Err(e) = registry.define_builtins() {
            // The built-in table is static; a failure here is a programming error in this module.
            tracing::error!("[TypeRegistry::create] Built-in type registration failed: {e}");
        }
        registry
    }

    fn define_builtins(&self) -> Result<(), ArborError> {
        let node = self.define(NodeTypeBuilder::new(NODE))?;

        let simple = self.define(NodeTypeBuilder::new(SIMPLE).parent(&node).prototype(
            |tree, id| {
                Err(ArborError::Configuration(format!(
                    "'{}' is abstract; instantiate Number, String or Boolean",
                    tree.path(id)
                )))
            },
        ))?;
        self.define(
            NodeTypeBuilder::new(NUMBER)
                .parent(&simple)
                .prototype(number_prototype),
        )?;
        self.define(
            NodeTypeBuilder::new(STRING)
                .parent(&simple)
                .prototype(text_prototype),
        )?;
        self.define(
            NodeTypeBuilder::new(BOOLEAN)
                .parent(&simple)
                .prototype(boolean_prototype),
        )?;

        let complex = self.define(NodeTypeBuilder::new(COMPLEX).parent(&node).prototype(
            |tree, id| {
                Err(ArborError::Configuration(format!(
                    "'{}' is abstract; instantiate Vector or Color",
                    tree.path(id)
                )))
            },
        ))?;
        self.define(
            NodeTypeBuilder::new(VECTOR)
                .parent(&complex)
                .prototype(vector_prototype),
        )?;
        self.define(
            NodeTypeBuilder::new(COLOR)
                .parent(&complex)
                .prototype(color_prototype),
        )?;

        self.define(
            NodeTypeBuilder::new(NODE_SET)
                .parent(&node)
                .prototype(set_prototype),
        )?;
        self.define(
            NodeTypeBuilder::new(NODE_LINK)
                .parent(&node)
                .prototype(link_prototype),
        )?;
        Ok(())
    }

    /// Register a node type.
    ///
    /// Fails with [`ArborError::DuplicateType`] if the name is taken, and with
    /// [`ArborError::DuplicateTag`] if the parent already declares a subtype with the same tag.
    pub fn define(&self, builder: NodeTypeBuilder) -> Result<Arc<NodeType>, ArborError> {
        let NodeTypeBuilder {
            name,
            tag,
            parent,
            prototype,
        } = builder;
        if name.is_empty() {
            return Err(ArborError::Configuration(
                "node types require a non-empty name".to_string(),
            ));
        }
        let tag = tag.unwrap_or_else(|| name.to_lowercase());

        let mut writer = self.0.write();
        if writer.contains_key(&name) {
            return Err(ArborError::DuplicateType(name));
        }
        if let Some(parent) = parent.as_ref() {
            let taken = parent
                .child_tags
                .read()
                .get(&tag)
                .is_some_and(|existing| existing.strong_count() > 0);
            if taken {
                return Err(ArborError::DuplicateTag {
                    parent: parent.name.clone(),
                    tag,
                });
            }
        }

        let node_type = Arc::new(NodeType {
            name: name.clone(),
            tag: tag.clone(),
            parent: parent.clone(),
            prototype,
            children: RwLock::new(BTreeMap::new()),
            child_tags: RwLock::new(BTreeMap::new()),
        });
        if let Some(parent) = parent.as_ref() {
            parent
                .children
                .write()
                .insert(name.clone(), Arc::downgrade(&node_type));
            parent
                .child_tags
                .write()
                .insert(tag, Arc::downgrade(&node_type));
        }
        tracing::debug!(
            "[TypeRegistry::define] Registered node type {} (parent: {:?})",
            name,
            parent.as_ref().map(|p| p.name())
        );
        writer.insert(name, node_type.clone());
        Ok(node_type)
    }

    /// Retrieve a node type by name
    pub fn get(&self, name: &str) -> Option<Arc<NodeType>> {
        self.0.read().get(name).cloned()
    }

    /// Like [`TypeRegistry::get`], but a missing type is an [`ArborError::NotFound`].
    pub fn require(&self, name: &str) -> Result<Arc<NodeType>, ArborError> {
        self.get(name)
            .ok_or_else(|| ArborError::NotFound(format!("node type '{name}' is not registered")))
    }

    /// List all registered type names
    pub fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Indented outline of every root type and its descendants, with tags.
    pub fn hierarchy(&self) -> String {
        fn walk(out: &mut String, ty: &NodeType, depth: usize) {
            let _ = writeln!(out, "{}{} ({})", "  ".repeat(depth), ty.name(), ty.tag());
            for child in ty.children() {
                walk(out, &child, depth + 1);
            }
        }
        let roots: Vec<Arc<NodeType>> = self
            .0
            .read()
            .values()
            .filter(|ty| ty.parent().is_none())
            .cloned()
            .collect();
        let mut out = String::new();
        for root in roots {
            walk(&mut out, &root, 0);
        }
        out
    }
}
