//! Composite leaves whose value is a fixed-order tuple of Number children.
//!
//! - Vector: `x`, `y`, `z`
//! - Color: `r`, `g`, `b`, `a` in `[0, 1]`, plus an optional free-text `text` name
//!
//! Both accept an array (positional), an object (per child), or a bare number broadcast to every
//! channel. Color additionally reads `"#rgb"`, `"#rgba"`, `"#rrggbb"` and `"#rrggbbaa"` literals;
//! any other string is kept verbatim as a color name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::ArborError,
    shape::{number_value, Scalar, Shape},
    simple::{Number, Text},
    tree::{NodeId, NodeKind, SerializeOptions, Tree},
};

const VECTOR_CHANNELS: [&str; 3] = ["x", "y", "z"];
const COLOR_CHANNELS: [&str; 4] = ["r", "g", "b", "a"];
const COLOR_TEXT: &str = "text";
const COLOR_HEX: &str = "hex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Complex {
    Vector,
    Color,
}

impl Complex {
    /// Numeric children in positional order.
    pub fn channels(&self) -> &'static [&'static str] {
        match self {
            Complex::Vector => &VECTOR_CHANNELS,
            Complex::Color => &COLOR_CHANNELS,
        }
    }
}

/// Detached color value with channels normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::rgb(0.0, 0.0, 0.0)
    }
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Rgba { r, g, b, a }
    }

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Rgba { r, g, b, a: 1.0 }
    }

    /// Parse a `#` followed by 3, 4, 6 or 8 hex digits.
    ///
    /// The short forms double each digit (`#f00` is `#ff0000`). Forms without an alpha digit
    /// are opaque.
    pub fn from_hex(input: &str) -> Option<Self> {
        let digits = input.trim().strip_prefix('#')?;
        let expanded = match digits.len() {
            3 | 4 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 | 8 => digits.to_string(),
            _ => return None,
        };
        let bytes = hex::decode(expanded).ok()?;
        let channel = |i: usize| bytes.get(i).map(|byte| f64::from(*byte) / 255.0);
        Some(Rgba {
            r: channel(0)?,
            g: channel(1)?,
            b: channel(2)?,
            a: channel(3).unwrap_or(1.0),
        })
    }

    /// `#rrggbb`, or `#rrggbbaa` when the color is translucent.
    pub fn hex(&self) -> String {
        let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mut bytes = vec![byte(self.r), byte(self.g), byte(self.b)];
        if self.a < 1.0 {
            bytes.push(byte(self.a));
        }
        format!("#{}", hex::encode(bytes))
    }

    /// Linear interpolation of r, g and b. The result is opaque.
    pub fn interpolate(c1: &Rgba, c2: &Rgba, t: f64) -> Rgba {
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Rgba::rgb(lerp(c1.r, c2.r), lerp(c1.g, c2.g), lerp(c1.b, c2.b))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn distance(v1: &Vec3, v2: &Vec3) -> f64 {
        ((v1.x - v2.x).powi(2) + (v1.y - v2.y).powi(2) + (v1.z - v2.z).powi(2)).sqrt()
    }
}

pub(crate) fn vector_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    tree.set_kind(id, NodeKind::Complex(Complex::Vector))?;
    for channel in VECTOR_CHANNELS {
        tree.add_number(id, channel, Number::default())?;
    }
    Ok(())
}

pub(crate) fn color_prototype(tree: &mut Tree, id: NodeId) -> Result<(), ArborError> {
    tree.set_kind(id, NodeKind::Complex(Complex::Color))?;
    for channel in COLOR_CHANNELS {
        let default = if channel == "a" { 1.0 } else { 0.0 };
        tree.add_number(
            id,
            channel,
            Number::new(default).with_range(Some(0.0), Some(1.0)),
        )?;
    }
    tree.add_text(id, COLOR_TEXT, Text::default())?;
    Ok(())
}

impl Tree {
    /// Deserialize into every channel or none: a failure part way through restores the channels
    /// written so far.
    pub(crate) fn deserialize_complex(
        &mut self,
        id: NodeId,
        complex: Complex,
        data: &Value,
    ) -> Result<(), ArborError> {
        let snapshot = self.leaf_snapshot(id)?;
        let result = self.apply_complex(id, complex, data);
        if result.is_err() {
            for (child, kind) in snapshot {
                if let Ok(node) = self.node_mut(child) {
                    node.kind = kind;
                }
            }
        }
        result
    }

    fn leaf_snapshot(&self, id: NodeId) -> Result<Vec<(NodeId, NodeKind)>, ArborError> {
        Ok(self
            .node(id)?
            .children()
            .iter()
            .filter_map(|child| self.get(*child).map(|node| (*child, node.kind().clone())))
            .collect())
    }

    fn apply_complex(
        &mut self,
        id: NodeId,
        complex: Complex,
        data: &Value,
    ) -> Result<(), ArborError> {
        match (Shape::of(data), complex) {
            (Shape::Null, _) => self.reset(id),
            (Shape::List(items), _) => {
                // zip stops at the shorter of the input and the channel list
                let channels = self.channel_ids(id, complex);
                for (child, item) in channels.into_iter().zip(items) {
                    self.deserialize(child, item)?;
                }
                Ok(())
            }
            (Shape::Record(map), _) => {
                for (key, value) in map {
                    if complex == Complex::Color && key == COLOR_HEX {
                        match Shape::of(value) {
                            Shape::Scalar(Scalar::Str(input)) => self.apply_hex(id, input)?,
                            other => return Err(self.invalid_shape(id, "a hex string", other)),
                        }
                        continue;
                    }
                    match self.child(id, key) {
                        Some(child) => self.deserialize(child, value)?,
                        None => self.unknown_key(id, key)?,
                    }
                }
                Ok(())
            }
            (Shape::Scalar(scalar @ Scalar::Number(_)), _) => {
                for child in self.channel_ids(id, complex) {
                    self.assign_scalar(child, scalar)?;
                }
                Ok(())
            }
            (Shape::Scalar(Scalar::Str(input)), Complex::Color) => {
                if input.starts_with('#') {
                    self.apply_hex(id, input)
                } else {
                    let text = self.color_text_id(id)?;
                    self.set_text(text, input)
                }
            }
            (other, Complex::Vector) => {
                Err(self.invalid_shape(id, "an array, an object or a number", other))
            }
            (other, Complex::Color) => Err(self.invalid_shape(
                id,
                "an array, an object, a number or a color string",
                other,
            )),
        }
    }

    pub(crate) fn serialize_complex(
        &self,
        id: NodeId,
        complex: Complex,
        options: &SerializeOptions,
    ) -> Option<Value> {
        match complex {
            Complex::Vector => {
                let numbers = self
                    .channel_ids(id, complex)
                    .into_iter()
                    .filter_map(|child| self.get(child).and_then(|node| node.as_number()))
                    .collect::<Vec<_>>();
                let len = if options.include_defaults {
                    numbers.len()
                } else {
                    // Keep undefined channels that sit before a defined one so positions survive.
                    numbers.iter().rposition(|number| !number.is_undefined())? + 1
                };
                Some(Value::Array(
                    numbers[..len]
                        .iter()
                        .map(|number| number_value(*number.value()))
                        .collect(),
                ))
            }
            Complex::Color => {
                if let Some(text) = self.color_text(id) {
                    return Some(Value::String(text));
                }
                let rgba = self.color(id).ok()?;
                if rgba == Rgba::default() && !options.include_defaults {
                    return None;
                }
                let mut channels = vec![rgba.r, rgba.g, rgba.b];
                if rgba.a != 1.0 || options.include_defaults {
                    channels.push(rgba.a);
                }
                Some(Value::Array(channels.into_iter().map(number_value).collect()))
            }
        }
    }

    /// Current channel values of a Color node.
    pub fn color(&self, id: NodeId) -> Result<Rgba, ArborError> {
        self.expect_complex(id, Complex::Color)?;
        Ok(Rgba {
            r: self.channel(id, "r")?,
            g: self.channel(id, "g")?,
            b: self.channel(id, "b")?,
            a: self.channel(id, "a")?,
        })
    }

    /// The free-text name of a Color node, if one is set.
    pub fn color_text(&self, id: NodeId) -> Option<String> {
        let text = self.child(id, COLOR_TEXT)?;
        let value = self.get(text)?.as_text()?.value();
        (!value.is_empty()).then(|| value.clone())
    }

    /// Write all four channels of a Color node and clear its text name.
    pub fn set_color(&mut self, id: NodeId, rgba: Rgba) -> Result<(), ArborError> {
        self.expect_complex(id, Complex::Color)?;
        let channels = self.channel_ids(id, Complex::Color);
        for (child, value) in channels.into_iter().zip([rgba.r, rgba.g, rgba.b, rgba.a]) {
            self.set_number(child, value)?;
        }
        let text = self.color_text_id(id)?;
        self.reset(text)
    }

    /// Current channel values of a Vector node.
    pub fn vector(&self, id: NodeId) -> Result<Vec3, ArborError> {
        self.expect_complex(id, Complex::Vector)?;
        Ok(Vec3 {
            x: self.channel(id, "x")?,
            y: self.channel(id, "y")?,
            z: self.channel(id, "z")?,
        })
    }

    /// Euclidean distance between two Vector nodes.
    pub fn distance(&self, v1: NodeId, v2: NodeId) -> Result<f64, ArborError> {
        Ok(Vec3::distance(&self.vector(v1)?, &self.vector(v2)?))
    }

    fn apply_hex(&mut self, id: NodeId, input: &str) -> Result<(), ArborError> {
        let rgba = Rgba::from_hex(input).ok_or_else(|| ArborError::InvalidColorFormat {
            path: self.path(id),
            input: input.to_string(),
        })?;
        tracing::debug!("[Tree::apply_hex] {} <- {input}", self.path(id));
        self.set_color(id, rgba)
    }

    fn channel_ids(&self, id: NodeId, complex: Complex) -> Vec<NodeId> {
        complex
            .channels()
            .iter()
            .filter_map(|name| self.child(id, name))
            .collect()
    }

    fn channel(&self, id: NodeId, name: &str) -> Result<f64, ArborError> {
        self.child(id, name)
            .and_then(|child| self.get(child))
            .and_then(|node| node.as_number())
            .map(|number| *number.value())
            .ok_or_else(|| {
                ArborError::NotFound(format!("'{}' has no numeric channel '{name}'", self.path(id)))
            })
    }

    fn color_text_id(&self, id: NodeId) -> Result<NodeId, ArborError> {
        self.child(id, COLOR_TEXT).ok_or_else(|| {
            ArborError::NotFound(format!("'{}' has no '{COLOR_TEXT}' child", self.path(id)))
        })
    }

    fn expect_complex(&self, id: NodeId, complex: Complex) -> Result<(), ArborError> {
        match self.node(id)?.kind() {
            NodeKind::Complex(found) if *found == complex => Ok(()),
            _ => Err(self.wrong_variant(
                id,
                match complex {
                    Complex::Vector => crate::registry::VECTOR,
                    Complex::Color => crate::registry::COLOR,
                },
            )),
        }
    }
}
