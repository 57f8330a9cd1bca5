//! Shared test utilities for engine-level tests

use crate::{
    config::TreeConfig,
    nodelink::LinkOrigin,
    registry::{NodeTypeBuilder, TypeRegistry, COLOR, NODE, NUMBER, VECTOR},
    simple::{Number, Text},
    tree::{NodeId, Tree},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Registry with a small palette model on top of the built-ins:
///
/// - `Swatch { color: Color, weight: Number[0, 1] = 1, label: String }`
/// - `Gradient` (tag `gradient`), a `Swatch` that adds `to: Color` and `stops: NodeSet<Number>`
/// - `Palette { swatches: NodeSet<Swatch>, primary: NodeLink -> swatches, anchor: Vector }`
pub fn palette_registry() -> TypeRegistry {
    let registry = TypeRegistry::create();
    let node = registry.get(NODE).expect("built-in Node type");

    let swatch = registry
        .define(
            NodeTypeBuilder::new("Swatch")
                .parent(&node)
                .prototype(|tree, id| add_swatch_fields(tree, id)),
        )
        .expect("define Swatch");
    registry
        .define(
            NodeTypeBuilder::new("Gradient")
                .tag("gradient")
                .parent(&swatch)
                .prototype(|tree, id| {
                    add_swatch_fields(tree, id)?;
                    tree.add(id, "to", COLOR)?;
                    tree.add_set(id, "stops", NUMBER)?;
                    Ok(())
                }),
        )
        .expect("define Gradient");
    registry
        .define(NodeTypeBuilder::new("Palette").parent(&node).prototype(|tree, id| {
            tree.add_set(id, "swatches", "Swatch")?;
            tree.add_link(id, "primary", LinkOrigin::relative(0, "swatches"), None)?;
            tree.add(id, "anchor", VECTOR)?;
            Ok(())
        }))
        .expect("define Palette");
    registry
}

fn add_swatch_fields(tree: &mut Tree, id: NodeId) -> Result<(), crate::ArborError> {
    tree.add(id, "color", COLOR)?;
    tree.add_number(id, "weight", Number::new(1.0).with_range(Some(0.0), Some(1.0)))?;
    tree.add_text(id, "label", Text::default())?;
    Ok(())
}

/// A fresh tree holding an empty `root/palette`.
pub fn palette_tree() -> (Tree, NodeId) {
    init_logging();
    let mut tree = Tree::with_registry(palette_registry(), TreeConfig::default());
    let root = tree.root();
    let palette = tree.add(root, "palette", "Palette").expect("add palette");
    (tree, palette)
}
