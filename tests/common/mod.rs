//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```
//!
//! The fixture domain is a miniature class model built purely on the public engine API:
//!
//! - `Model { name, classes: NodeSet<Class>, domains: NodeSet<Domain> }`
//! - `Class { label, color, position, weight[0, 100], abstract, kind, extends, subclasses, domains }`
//! - `Interface` (tag `interface`), a `Class` subtype with the same structure
//! - `Domain { label, classes }`
//!
//! `Class.extends` keeps `Class.subclasses` in sync, and `Class.domains` and `Domain.classes`
//! keep each other in sync.

use std::path::PathBuf;

use arbor_core::{
    config::TreeConfig,
    nodelink::LinkOrigin,
    registry::{NodeTypeBuilder, TypeRegistry, COLOR, NODE, VECTOR},
    simple::{Boolean, Number, Text},
    tree::{NodeId, Tree},
};
use serde_json::Value;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Built-in types plus `Model`, `Class`, `Interface` and `Domain`.
#[allow(dead_code)]
pub fn model_registry() -> TypeRegistry {
    let registry = TypeRegistry::create();
    let node = registry.require(NODE).unwrap();

    let class = registry
        .define(NodeTypeBuilder::new("Class").parent(&node).prototype(|tree, id| {
            tree.add_text(id, "label", Text::default())?;
            tree.add(id, "color", COLOR)?;
            tree.add(id, "position", VECTOR)?;
            tree.add_number(id, "weight", Number::new(1.0).with_range(Some(0.0), Some(100.0)))?;
            tree.add_boolean(id, "abstract", Boolean::default())?;
            tree.add_text(
                id,
                "kind",
                Text::new("entity").with_options(["entity", "event", "concept"]),
            )?;
            tree.add_link(id, "extends", LinkOrigin::Ancestor(1), Some("subclasses"))?;
            tree.add_link(id, "subclasses", LinkOrigin::Ancestor(1), None)?;
            tree.add_link(id, "domains", LinkOrigin::relative(2, "domains"), Some("classes"))?;
            Ok(())
        }))
        .unwrap();
    registry
        .define(NodeTypeBuilder::new("Interface").tag("interface").parent(&class))
        .unwrap();
    registry
        .define(NodeTypeBuilder::new("Domain").parent(&node).prototype(|tree, id| {
            tree.add_text(id, "label", Text::default())?;
            tree.add_link(id, "classes", LinkOrigin::relative(2, "classes"), Some("domains"))?;
            Ok(())
        }))
        .unwrap();
    registry
        .define(NodeTypeBuilder::new("Model").parent(&node).prototype(|tree, id| {
            tree.add_text(id, "name", Text::default())?;
            tree.add_set(id, "classes", "Class")?;
            tree.add_set(id, "domains", "Domain")?;
            Ok(())
        }))
        .unwrap();
    registry
}

/// A tree holding an empty model at `root/zoo`.
#[allow(dead_code)]
pub fn model_tree(config: TreeConfig) -> (Tree, NodeId) {
    init_logging();
    let mut tree = Tree::with_registry(model_registry(), config);
    let model = tree.add(tree.root(), "zoo", "Model").unwrap();
    (tree, model)
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Parse a JSON fixture from `tests/fixtures`.
#[allow(dead_code)]
pub fn load_fixture(name: &str) -> Value {
    let text = std::fs::read_to_string(fixture_path(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Reference names held by the link at `path` below `from`.
#[allow(dead_code)]
pub fn references(tree: &Tree, from: NodeId, path: &str) -> Vec<String> {
    let link = tree.lookup(from, path).unwrap();
    tree.node(link).unwrap().as_link().unwrap().references().to_vec()
}
