//! Input classification shared by every `deserialize` implementation.
//!
//! Documents arrive as loosely typed [`serde_json::Value`]s. Rather than probing the value ad hoc,
//! each node variant matches on a [`Shape`], which names the handful of forms the engine
//! distinguishes.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Bool(bool),
    Number(f64),
    Str(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    Null,
    Scalar(Scalar<'a>),
    List(&'a [Value]),
    /// A keyed object: the generic node form, or a configuration record for leaves.
    Record(&'a Map<String, Value>),
}

impl<'a> Shape<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Null => Shape::Null,
            Value::Bool(b) => Shape::Scalar(Scalar::Bool(*b)),
            // Only arbitrary-precision numbers lack an f64 view; treat them as absent.
            Value::Number(n) => n
                .as_f64()
                .map(|f| Shape::Scalar(Scalar::Number(f)))
                .unwrap_or(Shape::Null),
            Value::String(s) => Shape::Scalar(Scalar::Str(s)),
            Value::Array(items) => Shape::List(items),
            Value::Object(map) => Shape::Record(map),
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Shape::Null => "null",
            Shape::Scalar(Scalar::Bool(_)) => "a boolean",
            Shape::Scalar(Scalar::Number(_)) => "a number",
            Shape::Scalar(Scalar::Str(_)) => "a string",
            Shape::List(_) => "an array",
            Shape::Record(_) => "an object",
        }
    }
}

/// Emit integral floats as JSON integers so serialized documents read the way they are written.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
