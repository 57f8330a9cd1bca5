//! Scalar leaves: [`Simple<T>`] and its concrete variants [`Number`], [`Text`] (the `String` node
//! type) and [`Boolean`].
//!
//! A leaf can be authored either as a bare literal or as a configuration record:
//!
//! ```json
//! { "opacity": 0.5 }
//! { "opacity": { "min": 0, "max": 1, "default": 1, "value": 0.5 } }
//! ```
//!
//! Record fields always apply in the order `min`, `max`, `options`, `default`, `value`, so that
//! constraints are in place before any value is checked against them.

use std::ops::Deref;

use serde_json::{Map, Value};

use crate::{
    error::ArborError,
    registry::{BOOLEAN, NUMBER, STRING},
    shape::{number_value, Scalar, Shape},
    tree::{NodeId, NodeKind, SerializeOptions, Tree},
};

const RECORD_KEYS: [&str; 5] = ["min", "max", "options", "default", "value"];

/// Render a number the way documents and golden outputs expect it: integers without a decimal
/// point, everything else fixed to five decimals.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        if n == 0.0 {
            // Covers -0.0
            "0".to_string()
        } else {
            format!("{n:.0}")
        }
    } else {
        format!("{n:.5}")
    }
}

/// Conversion of a loosely typed input scalar into a leaf's value type.
pub trait Coerce: Sized + Clone + PartialEq {
    fn coerce(scalar: Scalar<'_>) -> Option<Self>;
    fn to_value(&self) -> Value;
}

impl Coerce for f64 {
    fn coerce(scalar: Scalar<'_>) -> Option<Self> {
        match scalar {
            Scalar::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Scalar::Number(n) => Some(n),
            Scalar::Str(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|n| n.is_finite())
    }

    fn to_value(&self) -> Value {
        number_value(*self)
    }
}

impl Coerce for String {
    fn coerce(scalar: Scalar<'_>) -> Option<Self> {
        Some(match scalar {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => format_number(n),
            Scalar::Str(s) => s.to_string(),
        })
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Coerce for bool {
    fn coerce(scalar: Scalar<'_>) -> Option<Self> {
        Some(match scalar {
            Scalar::Bool(b) => b,
            Scalar::Number(n) => n != 0.0,
            Scalar::Str(s) => s.trim().eq_ignore_ascii_case("true"),
        })
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

/// A single scalar value with a default.
///
/// `value` reads the explicit value when one was set and the default otherwise. Whether a value
/// was ever set ([`Simple::is_undefined`]) is tracked separately from whether it equals the
/// default ([`Simple::is_default`]); serialization omits defaulted leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Simple<T> {
    value: Option<T>,
    default: T,
}

impl<T: Coerce> Simple<T> {
    pub fn new(default: T) -> Self {
        Simple {
            value: None,
            default,
        }
    }

    pub fn value(&self) -> &T {
        self.value.as_ref().unwrap_or(&self.default)
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// The explicitly set value, if any.
    pub fn explicit(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_undefined(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_default(&self) -> bool {
        *self.value() == self.default
    }

    /// Returns whether the effective value changed. Writing the current value is a no-op.
    pub(crate) fn assign(&mut self, value: T) -> bool {
        if *self.value() == value {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub(crate) fn clear(&mut self) -> bool {
        match self.value.take() {
            Some(old) => old != self.default,
            None => false,
        }
    }

    pub(crate) fn set_default(&mut self, default: T) -> bool {
        let changed = self.value.is_none() && self.default != default;
        self.default = default;
        changed
    }

    pub fn serialize(&self, options: &SerializeOptions) -> Option<Value> {
        if self.is_default() && !options.include_defaults {
            None
        } else {
            Some(self.value().to_value())
        }
    }
}

/// Reasons a leaf refuses a value; turned into an [`ArborError`] once the node path is known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rejection {
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    NotAnOption {
        value: String,
        options: Vec<String>,
    },
}

/// Numeric leaf, optionally constrained to `min <= value <= max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    simple: Simple<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl Default for Number {
    fn default() -> Self {
        Number::new(0.0)
    }
}

impl Deref for Number {
    type Target = Simple<f64>;
    fn deref(&self) -> &Simple<f64> {
        &self.simple
    }
}

impl Number {
    pub fn new(default: f64) -> Self {
        Number {
            simple: Simple::new(default),
            min: None,
            max: None,
        }
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn admits(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    pub(crate) fn try_assign(&mut self, value: f64) -> Result<bool, Rejection> {
        Leaf::check(self, &value)?;
        Ok(self.simple.assign(value))
    }
}

/// String leaf, optionally restricted to an allow-list of options.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    simple: Simple<String>,
    options: Vec<String>,
}

impl Default for Text {
    fn default() -> Self {
        Text::new("")
    }
}

impl Deref for Text {
    type Target = Simple<String>;
    fn deref(&self) -> &Simple<String> {
        &self.simple
    }
}

impl Text {
    pub fn new<S: Into<String>>(default: S) -> Self {
        Text {
            simple: Simple::new(default.into()),
            options: Vec::new(),
        }
    }

    pub fn with_options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn admits(&self, value: &str) -> bool {
        self.options.is_empty() || self.options.iter().any(|option| option == value)
    }

    pub(crate) fn try_assign(&mut self, value: String) -> Result<bool, Rejection> {
        Leaf::check(self, &value)?;
        Ok(self.simple.assign(value))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Boolean {
    simple: Simple<bool>,
}

impl Deref for Boolean {
    type Target = Simple<bool>;
    fn deref(&self) -> &Simple<bool> {
        &self.simple
    }
}

impl Boolean {
    pub fn new(default: bool) -> Self {
        Boolean {
            simple: Simple::new(default),
        }
    }
}

impl Default for Simple<bool> {
    fn default() -> Self {
        Simple::new(false)
    }
}

/// A scalar leaf together with its constraints.
trait Leaf {
    type Value: Coerce;
    const TYPE_NAME: &'static str;

    fn simple(&self) -> &Simple<Self::Value>;
    fn simple_mut(&mut self) -> &mut Simple<Self::Value>;
    fn check(&self, value: &Self::Value) -> Result<(), Rejection>;

    /// Both the explicit value and the default satisfy the constraints.
    fn validate(&self) -> Result<(), Rejection> {
        if let Some(value) = self.simple().explicit() {
            self.check(value)?;
        }
        self.check(self.simple().default_value())
    }
}

impl Leaf for Number {
    type Value = f64;
    const TYPE_NAME: &'static str = NUMBER;

    fn simple(&self) -> &Simple<f64> {
        &self.simple
    }

    fn simple_mut(&mut self) -> &mut Simple<f64> {
        &mut self.simple
    }

    fn check(&self, value: &f64) -> Result<(), Rejection> {
        if self.admits(*value) {
            Ok(())
        } else {
            Err(Rejection::OutOfRange {
                value: *value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl Leaf for Text {
    type Value = String;
    const TYPE_NAME: &'static str = STRING;

    fn simple(&self) -> &Simple<String> {
        &self.simple
    }

    fn simple_mut(&mut self) -> &mut Simple<String> {
        &mut self.simple
    }

    fn check(&self, value: &String) -> Result<(), Rejection> {
        if self.admits(value) {
            Ok(())
        } else {
            Err(Rejection::NotAnOption {
                value: value.clone(),
                options: self.options.clone(),
            })
        }
    }
}

impl Leaf for Boolean {
    type Value = bool;
    const TYPE_NAME: &'static str = BOOLEAN;

    fn simple(&self) -> &Simple<bool> {
        &self.simple
    }

    fn simple_mut(&mut self) -> &mut Simple<bool> {
        &mut self.simple
    }

    fn check(&self, _value: &bool) -> Result<(), Rejection> {
        Ok(())
    }
}

/// A parsed configuration record. `value: Some(None)` is an explicit `null`.
#[derive(Default)]
struct LeafRecord<'a> {
    bounds: Option<(Option<f64>, Option<f64>)>,
    options: Option<Vec<String>>,
    default: Option<Scalar<'a>>,
    value: Option<Option<Scalar<'a>>>,
}

fn same_leaf(a: &NodeKind, b: &NodeKind) -> bool {
    match (a, b) {
        (NodeKind::Number(a), NodeKind::Number(b)) => a == b,
        (NodeKind::Text(a), NodeKind::Text(b)) => a == b,
        (NodeKind::Boolean(a), NodeKind::Boolean(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn number_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    tree.set_kind(id, NodeKind::Number(Number::default()))
}

pub(crate) fn text_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    tree.set_kind(id, NodeKind::Text(Text::default()))
}

pub(crate) fn boolean_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    tree.set_kind(id, NodeKind::Boolean(Boolean::default()))
}

impl Tree {
    pub fn add_number(
        &mut self,
        parent: NodeId,
        name: &str,
        number: Number,
    ) -> Result<NodeId, ArborError> {
        let id = self.add(parent, name, NUMBER)?;
        self.set_kind(id, NodeKind::Number(number))?;
        Ok(id)
    }

    pub fn add_text(&mut self, parent: NodeId, name: &str, text: Text) -> Result<NodeId, ArborError> {
        let id = self.add(parent, name, STRING)?;
        self.set_kind(id, NodeKind::Text(text))?;
        Ok(id)
    }

    pub fn add_boolean(
        &mut self,
        parent: NodeId,
        name: &str,
        boolean: Boolean,
    ) -> Result<NodeId, ArborError> {
        let id = self.add(parent, name, BOOLEAN)?;
        self.set_kind(id, NodeKind::Boolean(boolean))?;
        Ok(id)
    }

    pub fn set_number(&mut self, id: NodeId, value: f64) -> Result<(), ArborError> {
        let outcome = match &mut self.node_mut(id)?.kind {
            NodeKind::Number(number) => number.try_assign(value),
            _ => return Err(self.wrong_variant(id, NUMBER)),
        };
        self.settle(id, outcome)
    }

    pub fn set_text<S: Into<String>>(&mut self, id: NodeId, value: S) -> Result<(), ArborError> {
        let outcome = match &mut self.node_mut(id)?.kind {
            NodeKind::Text(text) => text.try_assign(value.into()),
            _ => return Err(self.wrong_variant(id, STRING)),
        };
        self.settle(id, outcome)
    }

    pub fn set_boolean(&mut self, id: NodeId, value: bool) -> Result<(), ArborError> {
        let changed = match &mut self.node_mut(id)?.kind {
            NodeKind::Boolean(boolean) => boolean.simple.assign(value),
            _ => return Err(self.wrong_variant(id, BOOLEAN)),
        };
        self.settle(id, Ok(changed))
    }

    /// Constrain a Number. The current value and default must already lie within the new bounds.
    pub fn set_bounds(
        &mut self,
        id: NodeId,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), ArborError> {
        let staged = match &self.node(id)?.kind {
            NodeKind::Number(number) => {
                let number = number.clone().with_range(min, max);
                number.validate().map_err(|rejection| self.rejected(id, rejection))?;
                NodeKind::Number(number)
            }
            _ => return Err(self.wrong_variant(id, NUMBER)),
        };
        self.commit_leaf(id, staged)
    }

    /// Restrict a String to an allow-list. An empty list lifts the restriction.
    ///
    /// Fails with [`ArborError::InvalidOption`] if the current value or default is not listed.
    pub fn set_options(&mut self, id: NodeId, options: Vec<String>) -> Result<(), ArborError> {
        let staged = match &self.node(id)?.kind {
            NodeKind::Text(text) => {
                let text = text.clone().with_options(options);
                text.validate().map_err(|rejection| self.rejected(id, rejection))?;
                NodeKind::Text(text)
            }
            _ => return Err(self.wrong_variant(id, STRING)),
        };
        self.commit_leaf(id, staged)
    }

    /// Drop the explicit value of a leaf, or of every leaf child of a Complex node.
    pub fn reset(&mut self, id: NodeId) -> Result<(), ArborError> {
        let node = self.node_mut(id)?;
        let changed = match &mut node.kind {
            NodeKind::Number(number) => number.simple.clear(),
            NodeKind::Text(text) => text.simple.clear(),
            NodeKind::Boolean(boolean) => boolean.simple.clear(),
            NodeKind::Complex(_) => {
                for child in node.children.clone() {
                    self.reset(child)?;
                }
                return Ok(());
            }
            _ => {
                return Err(ArborError::Configuration(format!(
                    "'{}' holds no value to reset",
                    self.path(id)
                )))
            }
        };
        self.settle(id, Ok(changed))
    }

    pub(crate) fn deserialize_simple(&mut self, id: NodeId, data: &Value) -> Result<(), ArborError> {
        match Shape::of(data) {
            Shape::Null => self.reset(id),
            Shape::Scalar(scalar) => self.assign_scalar(id, scalar),
            Shape::Record(map) => self.configure_simple(id, map),
            other => Err(self.invalid_shape(id, "a scalar or a configuration record", other)),
        }
    }

    /// Coerce `scalar` into the leaf's value type and write it.
    pub(crate) fn assign_scalar(&mut self, id: NodeId, scalar: Scalar<'_>) -> Result<(), ArborError> {
        let outcome = match &mut self.node_mut(id)?.kind {
            NodeKind::Number(number) => match f64::coerce(scalar) {
                Some(value) => number.try_assign(value),
                None => return Err(self.uncoercible(id, NUMBER, scalar)),
            },
            NodeKind::Text(text) => match String::coerce(scalar) {
                Some(value) => text.try_assign(value),
                None => return Err(self.uncoercible(id, STRING, scalar)),
            },
            NodeKind::Boolean(boolean) => match bool::coerce(scalar) {
                Some(value) => Ok(boolean.simple.assign(value)),
                None => return Err(self.uncoercible(id, BOOLEAN, scalar)),
            },
            _ => return Err(self.wrong_variant(id, "Simple")),
        };
        self.settle(id, outcome)
    }

    /// Apply a configuration record as one change: the record is parsed and applied to a copy
    /// of the leaf, and the copy replaces the leaf only if every field was accepted.
    fn configure_simple(&mut self, id: NodeId, map: &Map<String, Value>) -> Result<(), ArborError> {
        let is_number = self.node(id)?.as_number().is_some();
        let is_text = self.node(id)?.as_text().is_some();
        for key in map.keys() {
            let declared = match key.as_str() {
                "min" | "max" => is_number,
                "options" => is_text,
                other => RECORD_KEYS.contains(&other),
            };
            if !declared {
                self.unknown_key(id, key)?;
            }
        }

        let record = self.parse_record(id, map, is_number, is_text)?;
        let staged = match &self.node(id)?.kind {
            NodeKind::Number(number) => {
                let mut number = number.clone();
                if let Some((min, max)) = record.bounds {
                    number = number.with_range(min, max);
                }
                self.apply_record(id, &mut number, &record)?;
                NodeKind::Number(number)
            }
            NodeKind::Text(text) => {
                let mut text = text.clone();
                if let Some(options) = &record.options {
                    text = text.with_options(options.iter().cloned());
                }
                self.apply_record(id, &mut text, &record)?;
                NodeKind::Text(text)
            }
            NodeKind::Boolean(boolean) => {
                let mut boolean = boolean.clone();
                self.apply_record(id, &mut boolean, &record)?;
                NodeKind::Boolean(boolean)
            }
            _ => return Err(self.wrong_variant(id, "Simple")),
        };
        self.commit_leaf(id, staged)
    }

    fn parse_record<'a>(
        &self,
        id: NodeId,
        map: &'a Map<String, Value>,
        is_number: bool,
        is_text: bool,
    ) -> Result<LeafRecord<'a>, ArborError> {
        let mut record = LeafRecord::default();

        if is_number && (map.contains_key("min") || map.contains_key("max")) {
            let (mut min, mut max) = self
                .node(id)?
                .as_number()
                .map(|n| (n.min, n.max))
                .unwrap_or_default();
            if let Some(bound) = map.get("min") {
                min = self.bound(id, bound)?;
            }
            if let Some(bound) = map.get("max") {
                max = self.bound(id, bound)?;
            }
            record.bounds = Some((min, max));
        }

        if let (true, Some(options)) = (is_text, map.get("options")) {
            record.options = Some(match options {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match Shape::of(item) {
                        Shape::Scalar(scalar) => String::coerce(scalar)
                            .ok_or_else(|| self.invalid_shape(id, "a list of strings", Shape::of(item))),
                        other => Err(self.invalid_shape(id, "a list of strings", other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => return Err(self.invalid_shape(id, "a list of strings", Shape::of(other))),
            });
        }

        if let Some(default) = map.get("default") {
            match Shape::of(default) {
                Shape::Scalar(scalar) => record.default = Some(scalar),
                other => return Err(self.invalid_shape(id, "a scalar default", other)),
            }
        }

        if let Some(value) = map.get("value") {
            match Shape::of(value) {
                Shape::Null => record.value = Some(None),
                Shape::Scalar(scalar) => record.value = Some(Some(scalar)),
                other => return Err(self.invalid_shape(id, "a scalar value", other)),
            }
        }
        Ok(record)
    }

    /// Default, then value, then a final check that the leaf as a whole satisfies its
    /// (possibly new) constraints.
    fn apply_record<L: Leaf>(
        &self,
        id: NodeId,
        leaf: &mut L,
        record: &LeafRecord<'_>,
    ) -> Result<(), ArborError> {
        let coerce = |scalar: Scalar<'_>| {
            <L::Value as Coerce>::coerce(scalar)
                .ok_or_else(|| self.uncoercible(id, L::TYPE_NAME, scalar))
        };
        if let Some(scalar) = record.default {
            let default = coerce(scalar)?;
            leaf.check(&default).map_err(|rejection| self.rejected(id, rejection))?;
            leaf.simple_mut().set_default(default);
        }
        match record.value {
            Some(Some(scalar)) => {
                let value = coerce(scalar)?;
                leaf.check(&value).map_err(|rejection| self.rejected(id, rejection))?;
                leaf.simple_mut().assign(value);
            }
            Some(None) => {
                leaf.simple_mut().clear();
            }
            None => {}
        }
        leaf.validate().map_err(|rejection| self.rejected(id, rejection))
    }

    /// Replace a leaf's payload, dirtying the node if anything changed.
    fn commit_leaf(&mut self, id: NodeId, staged: NodeKind) -> Result<(), ArborError> {
        let node = self.node_mut(id)?;
        let changed = !same_leaf(&node.kind, &staged);
        node.kind = staged;
        if changed {
            self.mark_dirty(id);
        }
        Ok(())
    }

    fn bound(&self, id: NodeId, bound: &Value) -> Result<Option<f64>, ArborError> {
        match Shape::of(bound) {
            Shape::Null => Ok(None),
            Shape::Scalar(Scalar::Number(n)) => Ok(Some(n)),
            other => Err(self.invalid_shape(id, "a numeric bound", other)),
        }
    }

    /// Turn a leaf write outcome into the public result, dirtying the node if its value changed.
    fn settle(&mut self, id: NodeId, outcome: Result<bool, Rejection>) -> Result<(), ArborError> {
        match outcome {
            Ok(true) => {
                self.mark_dirty(id);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(rejection) => Err(self.rejected(id, rejection)),
        }
    }

    fn rejected(&self, id: NodeId, rejection: Rejection) -> ArborError {
        match rejection {
            Rejection::OutOfRange { value, min, max } => ArborError::RangeViolation {
                path: self.path(id),
                value,
                min,
                max,
            },
            Rejection::NotAnOption { value, options } => ArborError::InvalidOption {
                path: self.path(id),
                value,
                options,
            },
        }
    }

    fn uncoercible(&self, id: NodeId, type_name: &str, scalar: Scalar<'_>) -> ArborError {
        let found = match scalar {
            Scalar::Str(s) => format!("'{s}'"),
            other => format!("{other:?}"),
        };
        ArborError::InvalidShape {
            path: self.path(id),
            expected: format!("a value convertible to {type_name}"),
            found,
        }
    }

    pub(crate) fn wrong_variant(&self, id: NodeId, expected: &str) -> ArborError {
        let found = self
            .get(id)
            .map(|node| node.node_type().name().to_string())
            .unwrap_or_default();
        ArborError::Configuration(format!(
            "'{}' is a {found} node, not a {expected}",
            self.path(id)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_log::test;

    fn number_tree(min: Option<f64>, max: Option<f64>) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let id = tree
            .add_number(root, "level", Number::new(0.0).with_range(min, max))
            .unwrap();
        (tree, id)
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.1), "3.10000");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.123456), "0.12346");
    }

    #[test]
    fn test_number_bounds() {
        let (mut tree, id) = number_tree(Some(0.0), Some(10.0));

        for bad in [-1.0, 11.0] {
            let err = tree.set_number(id, bad).unwrap_err();
            assert_eq!(
                err,
                ArborError::RangeViolation {
                    path: "root/level".to_string(),
                    value: bad,
                    min: Some(0.0),
                    max: Some(10.0),
                }
            );
        }
        assert!(tree.node(id).unwrap().as_number().unwrap().is_undefined());

        tree.set_number(id, 5.0).unwrap();
        assert_eq!(*tree.node(id).unwrap().as_number().unwrap().value(), 5.0);
        assert_eq!(tree.display(id).to_string(), "5");
    }

    #[test]
    fn test_one_sided_bound() {
        let (mut tree, id) = number_tree(None, Some(1.0));
        assert!(tree.set_number(id, -100.0).is_ok());
        assert!(matches!(
            tree.set_number(id, 1.5),
            Err(ArborError::RangeViolation { .. })
        ));
    }

    #[test]
    fn test_shape_dispatch_for_numbers() {
        let (mut tree, id) = number_tree(None, None);
        let read = |tree: &Tree| *tree.node(id).unwrap().as_number().unwrap().value();

        tree.deserialize(id, &json!(true)).unwrap();
        assert_eq!(read(&tree), 1.0);
        tree.deserialize(id, &json!("2.5")).unwrap();
        assert_eq!(read(&tree), 2.5);
        tree.deserialize(id, &json!(7)).unwrap();
        assert_eq!(read(&tree), 7.0);
        assert!(matches!(
            tree.deserialize(id, &json!("seven")),
            Err(ArborError::InvalidShape { .. })
        ));
        assert!(matches!(
            tree.deserialize(id, &json!([1])),
            Err(ArborError::InvalidShape { .. })
        ));
        tree.deserialize(id, &json!(null)).unwrap();
        assert!(tree.node(id).unwrap().as_number().unwrap().is_undefined());
    }

    #[test]
    fn test_configuration_record_applies_constraints_first() {
        let (mut tree, id) = number_tree(None, None);
        // Written out of order on purpose: bounds must apply before default and value.
        tree.deserialize(
            id,
            &json!({"value": 0.5, "default": 1, "max": 1, "min": 0}),
        )
        .unwrap();
        let number = tree.node(id).unwrap().as_number().unwrap();
        assert_eq!((number.min(), number.max()), (Some(0.0), Some(1.0)));
        assert_eq!(*number.default_value(), 1.0);
        assert_eq!(*number.value(), 0.5);

        let err = tree.deserialize(id, &json!({"value": 2})).unwrap_err();
        assert!(matches!(err, ArborError::RangeViolation { value, .. } if value == 2.0));
    }

    #[test]
    fn test_rejected_record_changes_nothing() {
        let (mut tree, id) = number_tree(None, None);
        tree.set_number(id, 3.0).unwrap();
        tree.update(id, false).unwrap();

        let err = tree
            .deserialize(id, &json!({"min": 0, "max": 1, "value": 5}))
            .unwrap_err();
        assert!(matches!(err, ArborError::RangeViolation { value, .. } if value == 5.0));
        // Bounds that the current value violates are refused as a whole.
        let err = tree.deserialize(id, &json!({"min": 0, "max": 1})).unwrap_err();
        assert!(matches!(err, ArborError::RangeViolation { value, .. } if value == 3.0));
        assert!(matches!(
            tree.deserialize(id, &json!({"default": 2, "value": "many"})),
            Err(ArborError::InvalidShape { .. })
        ));

        let number = tree.node(id).unwrap().as_number().unwrap();
        assert_eq!((number.min(), number.max()), (None, None));
        assert_eq!(*number.value(), 3.0);
        assert_eq!(*number.default_value(), 0.0);
        assert!(tree.node(id).unwrap().updated());

        // Moving the value in with the same record is accepted.
        tree.deserialize(id, &json!({"min": 0, "max": 1, "value": 1})).unwrap();
        let number = tree.node(id).unwrap().as_number().unwrap();
        assert_eq!((number.min(), number.max(), *number.value()), (Some(0.0), Some(1.0), 1.0));
        assert!(!tree.node(id).unwrap().updated());
    }

    #[test]
    fn test_constraints_must_admit_current_state() {
        let (mut tree, id) = number_tree(None, None);
        tree.set_number(id, 8.0).unwrap();
        assert_eq!(
            tree.set_bounds(id, Some(0.0), Some(5.0)).unwrap_err(),
            ArborError::RangeViolation {
                path: "root/level".to_string(),
                value: 8.0,
                min: Some(0.0),
                max: Some(5.0),
            }
        );
        // The default is checked too.
        assert!(matches!(
            tree.set_bounds(id, Some(1.0), None),
            Err(ArborError::RangeViolation { value, .. }) if value == 0.0
        ));
        assert_eq!(tree.node(id).unwrap().as_number().unwrap().max(), None);
        tree.set_bounds(id, Some(0.0), Some(10.0)).unwrap();

        let root = tree.root();
        let text = tree
            .add_text(root, "shape", Text::new("circle").with_options(["circle", "square"]))
            .unwrap();
        tree.set_text(text, "square").unwrap();
        assert!(matches!(
            tree.set_options(text, vec!["circle".to_string()]),
            Err(ArborError::InvalidOption { ref value, .. }) if value == "square"
        ));
        assert_eq!(tree.node(text).unwrap().as_text().unwrap().options().len(), 2);
        tree.set_options(text, Vec::new()).unwrap();
        tree.set_text(text, "hexagon").unwrap();
    }

    #[test]
    fn test_non_finite_numbers_are_refused() {
        let (mut tree, id) = number_tree(None, None);
        for input in ["inf", "-infinity", "NaN"] {
            assert!(matches!(
                tree.deserialize(id, &json!(input)),
                Err(ArborError::InvalidShape { .. })
            ));
        }
        assert!(tree.node(id).unwrap().as_number().unwrap().is_undefined());
    }

    #[test]
    fn test_text_options() {
        let mut tree = Tree::new();
        let root = tree.root();
        let id = tree
            .add_text(root, "shape", Text::new("circle").with_options(["circle", "square"]))
            .unwrap();

        tree.set_text(id, "square").unwrap();
        let err = tree.set_text(id, "triangle").unwrap_err();
        assert_eq!(
            err,
            ArborError::InvalidOption {
                path: "root/shape".to_string(),
                value: "triangle".to_string(),
                options: vec!["circle".to_string(), "square".to_string()],
            }
        );

        tree.deserialize(id, &json!({"options": ["circle", "square", "triangle"], "value": "triangle"}))
            .unwrap();
        assert_eq!(tree.display(id).to_string(), "triangle");
    }

    #[test]
    fn test_text_and_boolean_coercion() {
        let mut tree = Tree::new();
        let root = tree.root();
        let text = tree.add_text(root, "label", Text::default()).unwrap();
        let flag = tree.add_boolean(root, "visible", Boolean::default()).unwrap();

        tree.deserialize(text, &json!(3.1)).unwrap();
        assert_eq!(tree.node(text).unwrap().as_text().unwrap().value(), "3.10000");
        tree.deserialize(text, &json!(false)).unwrap();
        assert_eq!(tree.node(text).unwrap().as_text().unwrap().value(), "false");

        tree.deserialize(flag, &json!("TRUE")).unwrap();
        assert!(*tree.node(flag).unwrap().as_boolean().unwrap().value());
        tree.deserialize(flag, &json!("yes")).unwrap();
        assert!(!*tree.node(flag).unwrap().as_boolean().unwrap().value());
        tree.deserialize(flag, &json!(2)).unwrap();
        assert!(*tree.node(flag).unwrap().as_boolean().unwrap().value());
    }

    #[test]
    fn test_default_versus_undefined() {
        let (mut tree, id) = number_tree(None, None);
        assert_eq!(tree.serialize(id), None);

        // Writing the current (default) value is a no-op: the leaf stays undefined.
        tree.update(id, false).unwrap();
        tree.set_number(id, 0.0).unwrap();
        let number = tree.node(id).unwrap().as_number().unwrap();
        assert!(number.is_undefined());
        assert!(number.is_default());
        assert!(tree.node(id).unwrap().updated());

        tree.set_number(id, 4.0).unwrap();
        assert!(!tree.node(id).unwrap().updated());
        assert_eq!(tree.serialize(id), Some(json!(4)));

        tree.deserialize(id, &json!({"default": 4})).unwrap();
        let number = tree.node(id).unwrap().as_number().unwrap();
        assert!(!number.is_undefined());
        assert!(number.is_default());
        assert_eq!(tree.serialize(id), None);
        assert_eq!(
            tree.serialize_with(id, &SerializeOptions { include_defaults: true }),
            Some(json!(4))
        );
    }

    #[test]
    fn test_record_keys_are_variant_specific() {
        let mut tree = Tree::with_config(crate::config::TreeConfig {
            unknown_keys: crate::config::UnknownKeyPolicy::Error,
            ..Default::default()
        });
        let root = tree.root();
        let flag = tree.add_boolean(root, "flag", Boolean::default()).unwrap();
        assert_eq!(
            tree.deserialize(flag, &json!({"min": 0})).unwrap_err(),
            ArborError::UnknownChild {
                path: "root/flag".to_string(),
                key: "min".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_variant_setter() {
        let mut tree = Tree::new();
        let root = tree.root();
        let flag = tree.add_boolean(root, "flag", Boolean::default()).unwrap();
        assert!(matches!(
            tree.set_number(flag, 1.0),
            Err(ArborError::Configuration(_))
        ));
    }
}
