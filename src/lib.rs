//! # arbor-core
//!
//! A strongly-typed hierarchical document model: a tree of named nodes, each carrying runtime type
//! metadata, that reads from and writes to loosely typed JSON-like data and supports typed
//! cross references between nodes that do not own each other.
//!
//! ## Overview
//!
//! arbor-core is the engine underneath a knowledge-graph style domain model. Domain code declares
//! node types at startup, composes them out of a small set of built-in variants, and then relies
//! on one contract for every node: `deserialize`, `serialize`, `update`.
//!
//! ### Key Features
//!
//! - **Runtime type system**: node types form a hierarchy with `is()` checks and tag-selected
//!   subtypes, registered once in a [`registry::TypeRegistry`]
//! - **Shape-driven input**: the same field can be authored as a bare literal or as a fully
//!   configured record (`{"min": 0, "max": 1, "value": 0.5}`)
//! - **Sparse output**: anything still at its default is omitted, so documents stay small
//! - **Polymorphic collections**: [`nodeset`] elements pick their subtype from a `"type"` tag
//! - **Self-repairing links**: [`nodelink`] references are resolved lazily and keep declared
//!   inverse relationships consistent in both directions
//! - **Explicit dirty tracking**: every mutation clears `updated`; only `update` sets it again
//!
//! ## Architecture
//!
//! - **[`tree`]**: the arena (`Tree`, `NodeId`, `Node`) and the generic node contract
//! - **[`registry`]**: `NodeType`, `TypeRegistry` and the process-wide [`registry::TYPES`]
//! - **[`simple`]**: scalar leaves (`Number`, `String`, `Boolean`)
//! - **[`complex`]**: fixed tuples of numbers (`Vector`, `Color`)
//! - **[`nodeset`]**: keyed or indexed collections
//! - **[`nodelink`]**: by-name references with inverse repair
//! - **[`shape`]**: the input classification every `deserialize` matches on
//! - **[`config`]**, **[`diagnostic`]**, **[`error`]**: tree settings, non-fatal reports, failures
//! - **[`format`]**: JSON, YAML and TOML text conversion
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor_core::{
//!     config::TreeConfig,
//!     nodelink::LinkOrigin,
//!     registry::{NodeTypeBuilder, TypeRegistry, COLOR, NODE},
//!     tree::Tree,
//! };
//! use serde_json::json;
//!
//! # fn main() -> Result<(), arbor_core::ArborError> {
//! let registry = TypeRegistry::create();
//! let node = registry.require(NODE)?;
//! registry.define(NodeTypeBuilder::new("Class").parent(&node).prototype(|tree, id| {
//!     tree.add(id, "color", COLOR)?;
//!     tree.add_link(id, "extends", LinkOrigin::Ancestor(1), Some("subclasses"))?;
//!     tree.add_link(id, "subclasses", LinkOrigin::Ancestor(1), None)?;
//!     Ok(())
//! }))?;
//!
//! let mut tree = Tree::with_registry(registry, TreeConfig::default());
//! let classes = tree.add_set(tree.root(), "classes", "Class")?;
//! tree.deserialize(
//!     classes,
//!     &json!({"Shape": {"color": "#f00"}, "Circle": {"extends": ["Shape"]}}),
//! )?;
//!
//! // Links resolve on update, which also fills in the inverse side.
//! if let Some(extends) = tree.lookup(classes, "Circle/extends") {
//!     tree.update(extends, false)?;
//! }
//! assert_eq!(
//!     tree.serialize(classes),
//!     Some(json!({
//!         "Circle": {"extends": ["Shape"]},
//!         "Shape": {"color": [1, 0, 0], "subclasses": ["Circle"]}
//!     }))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors and Diagnostics
//!
//! Integrity problems (a dangling reference, an unknown subtype tag, a value outside its range)
//! abort the call with an [`ArborError`] naming the node path. Recoverable conditions, such as a
//! positional lookup past the end of a set or an unknown input key under
//! [`config::UnknownKeyPolicy::Warn`], are logged through `tracing` and kept on the tree as
//! [`diagnostic::Diagnostic`]s.
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `arbor` command line tool (`clap`, `tracing-subscriber`)

pub mod complex;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod format;
pub mod nodelink;
pub mod nodeset;
pub mod registry;
pub mod shape;
pub mod simple;
#[cfg(test)]
mod tests;
pub mod tree;

pub use error::*;
