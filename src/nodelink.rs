//! By-name references between nodes that do not own each other.
//!
//! A link stores an ordered list of reference names and the [`LinkOrigin`] they are looked up in.
//! Names are resolved on [`Tree::update`], never on construction, because the origin collection
//! may still be filling up when the link is created.
//!
//! When a link declares an inverse, every target must carry a sibling link of that name. If the
//! target's inverse does not mention this link's owner yet, the owner's name is appended to it,
//! so a relationship declared in one direction is visible from both ends.
//!
//! Resolved targets are cached as [`NodeId`]s only. A link never extends the lifetime of what it
//! points at.

use serde_json::Value;

use crate::{
    error::ArborError,
    registry::NODE_LINK,
    shape::Shape,
    tree::{NodeId, NodeKind, SerializeOptions, Tree},
};

/// Where a link looks up its reference names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOrigin {
    /// A fixed node
    Node(NodeId),
    /// The n-th ancestor of the link's owner; `Ancestor(0)` is the owner itself.
    Ancestor(usize),
    /// A name path from the tree root
    Path(Vec<String>),
    /// A name path below the `up`-th ancestor of the link's owner
    Relative { up: usize, path: Vec<String> },
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

impl LinkOrigin {
    /// Parse a `/`-separated path from the root.
    pub fn path(path: &str) -> Self {
        LinkOrigin::Path(segments(path))
    }

    /// Climb `up` ancestors from the owner, then follow the `/`-separated `path`.
    pub fn relative(up: usize, path: &str) -> Self {
        LinkOrigin::Relative {
            up,
            path: segments(path),
        }
    }
}

/// Variant state of a NodeLink node.
#[derive(Debug, Clone)]
pub struct NodeLink {
    references: Vec<String>,
    origin: LinkOrigin,
    inverse: Option<String>,
    resolved: Vec<(String, NodeId)>,
}

impl NodeLink {
    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn origin(&self) -> &LinkOrigin {
        &self.origin
    }

    pub fn inverse(&self) -> Option<&str> {
        self.inverse.as_deref()
    }

    /// Resolved `(name, target)` pairs in reference order. Empty until the link is updated.
    pub fn resolved(&self) -> &[(String, NodeId)] {
        &self.resolved
    }

    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.resolved.iter().map(|(_, target)| *target)
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.resolved
            .iter()
            .find(|(resolved, _)| resolved == name)
            .map(|(_, target)| *target)
    }

    pub fn serialize(&self, options: &SerializeOptions) -> Option<Value> {
        if self.references.is_empty() && !options.include_defaults {
            return None;
        }
        Some(Value::Array(
            self.references.iter().cloned().map(Value::String).collect(),
        ))
    }
}

pub(crate) fn link_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    Err(ArborError::Configuration(format!(
        "NodeLink '{}' requires an origin; create it with Tree::add_link",
        tree.path(id)
    )))
}

impl Tree {
    /// Add a NodeLink named `name` under `owner`.
    ///
    /// `inverse` names the link on each target that should point back at `owner`.
    pub fn add_link(
        &mut self,
        owner: NodeId,
        name: &str,
        origin: LinkOrigin,
        inverse: Option<&str>,
    ) -> Result<NodeId, ArborError> {
        let link_type = self.registry().require(NODE_LINK)?;
        let id = self.insert_node(owner, name, link_type)?;
        self.set_kind(
            id,
            NodeKind::Link(NodeLink {
                references: Vec::new(),
                origin,
                inverse: inverse.map(str::to_string),
                resolved: Vec::new(),
            }),
        )?;
        Ok(id)
    }

    /// Replace the reference list. Resolution is deferred to the next update.
    pub fn set_references(&mut self, id: NodeId, references: Vec<String>) -> Result<(), ArborError> {
        let link = self.link_mut(id)?;
        if link.references == references {
            return Ok(());
        }
        link.references = references;
        link.resolved.clear();
        self.mark_dirty(id);
        Ok(())
    }

    pub(crate) fn deserialize_link(&mut self, id: NodeId, data: &Value) -> Result<(), ArborError> {
        let items = match Shape::of(data) {
            Shape::List(items) => items,
            other => {
                return Err(ArborError::InvalidLinkData {
                    path: self.path(id),
                    found: other.describe().to_string(),
                })
            }
        };
        let references = items
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(name.clone()),
                other => Err(ArborError::InvalidLinkData {
                    path: self.path(id),
                    found: format!("an array containing {}", Shape::of(other).describe()),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.set_references(id, references)
    }

    /// Resolve every reference, then commit the cache and repair inverse links.
    ///
    /// Nothing is written until every name and every inverse has resolved; on failure the cache
    /// is left empty and no inverse link is touched. A repaired inverse is marked dirty, since
    /// its references changed.
    pub(crate) fn update_link(&mut self, id: NodeId) -> Result<(), ArborError> {
        let result = self.resolve_link(id);
        let (resolved, repairs, owner) = match result {
            Ok(plan) => plan,
            Err(e) => {
                self.link_mut(id)?.resolved.clear();
                return Err(e);
            }
        };
        self.link_mut(id)?.resolved = resolved;

        let owner_name = self.node(owner)?.name().to_string();
        for inverse in repairs {
            let link = self.link_mut(inverse)?;
            if link.references.contains(&owner_name) {
                continue;
            }
            link.references.push(owner_name.clone());
            link.resolved.push((owner_name.clone(), owner));
            tracing::debug!(
                "[Tree::update_link] Repaired inverse {} with '{owner_name}'",
                self.path(inverse)
            );
            self.mark_dirty(inverse);
        }
        Ok(())
    }

    /// Returns the resolved cache, the inverse links needing repair and the link's owner.
    #[allow(clippy::type_complexity)]
    fn resolve_link(
        &self,
        id: NodeId,
    ) -> Result<(Vec<(String, NodeId)>, Vec<NodeId>, NodeId), ArborError> {
        let node = self.node(id)?;
        let link = node
            .as_link()
            .ok_or_else(|| self.wrong_variant(id, NODE_LINK))?;
        let owner = node.parent().ok_or_else(|| {
            ArborError::Configuration(format!("link '{}' has no owner", self.path(id)))
        })?;
        let owner_name = self.node(owner)?.name();
        let origin = self.resolve_origin(id, owner, link.origin())?;

        let mut resolved = Vec::with_capacity(link.references.len());
        let mut repairs = Vec::new();
        for reference in link.references.iter() {
            let target =
                self.child(origin, reference)
                    .ok_or_else(|| ArborError::InvalidReference {
                        path: self.path(id),
                        reference: reference.clone(),
                    })?;
            resolved.push((reference.clone(), target));

            let Some(inverse) = link.inverse() else {
                continue;
            };
            let inverse_link = self
                .child(target, inverse)
                .and_then(|candidate| Some((candidate, self.get(candidate)?.as_link()?)))
                .ok_or_else(|| ArborError::InvalidInverseLink {
                    path: self.path(id),
                    target: self.path(target),
                    inverse: inverse.to_string(),
                })?;
            let (inverse_id, inverse_link) = inverse_link;
            if !inverse_link.references.iter().any(|name| name == owner_name)
                && !repairs.contains(&inverse_id)
            {
                repairs.push(inverse_id);
            }
        }
        Ok((resolved, repairs, owner))
    }

    fn resolve_origin(
        &self,
        id: NodeId,
        owner: NodeId,
        origin: &LinkOrigin,
    ) -> Result<NodeId, ArborError> {
        let ancestor = |levels: usize| {
            (0..levels).try_fold(owner, |current, _| {
                self.get(current).and_then(|node| node.parent())
            })
        };
        let descend = |from: NodeId, names: &[String]| {
            names
                .iter()
                .try_fold(from, |current, name| self.child(current, name))
        };
        let found = match origin {
            LinkOrigin::Node(node) => self.contains(*node).then_some(*node),
            LinkOrigin::Ancestor(levels) => ancestor(*levels),
            LinkOrigin::Path(names) => descend(self.root(), names),
            LinkOrigin::Relative { up, path } => {
                ancestor(*up).and_then(|from| descend(from, path))
            }
        };
        found.ok_or_else(|| {
            ArborError::NotFound(format!(
                "origin {origin:?} of link '{}' does not exist",
                self.path(id)
            ))
        })
    }

    fn link_mut(&mut self, id: NodeId) -> Result<&mut NodeLink, ArborError> {
        if self.node(id)?.as_link().is_none() {
            return Err(self.wrong_variant(id, NODE_LINK));
        }
        match &mut self.node_mut(id)?.kind {
            NodeKind::Link(link) => Ok(link),
            _ => Err(ArborError::NotFound(format!("link {id}"))),
        }
    }
}
