//! Document format integration tests: the same model authored as JSON, YAML and TOML.

mod common;

use arbor_core::{
    config::TreeConfig,
    format::{emit, parse, DocFormat},
};
use common::*;
use test_log::test;

#[test]
fn test_yaml_and_json_fixtures_agree() {
    let json_text = std::fs::read_to_string(fixture_path("model.json")).unwrap();
    let yaml_text = std::fs::read_to_string(fixture_path("model.yaml")).unwrap();
    let from_json = parse(&json_text, DocFormat::from_path("model.json").unwrap()).unwrap();
    let from_yaml = parse(&yaml_text, DocFormat::from_path("model.yaml").unwrap()).unwrap();
    assert_eq!(from_json, from_yaml);
}

#[test]
fn test_normalized_model_survives_every_format() {
    let (mut tree, model) = model_tree(TreeConfig::default());
    tree.deserialize(model, &load_fixture("model.json")).unwrap();
    tree.update_subtree(model, false).unwrap();
    let normalized = tree.serialize(model).unwrap();

    for format in [DocFormat::Json, DocFormat::Yaml, DocFormat::Toml] {
        let text = emit(&normalized, format).unwrap();
        let reparsed = parse(&text, format).unwrap();

        let (mut copy, copy_model) = model_tree(TreeConfig::default());
        copy.deserialize(copy_model, &reparsed).unwrap();
        copy.update_subtree(copy_model, false).unwrap();
        assert_eq!(copy.serialize(copy_model).as_ref(), Some(&normalized), "{format}");
    }
}
