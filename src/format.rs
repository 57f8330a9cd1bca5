//! Text formats for documents.
//!
//! The engine itself only deals in [`serde_json::Value`]. These helpers convert between that and
//! JSON, YAML or TOML text; reading and writing files is left to the caller.

use std::{fmt::Display, path::Path, str::FromStr};

use serde_json::{Map, Value};

use crate::error::ArborError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Json,
    Yaml,
    Toml,
}

impl DocFormat {
    /// Pick a format from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<DocFormat> {
        let extension = path.as_ref().extension()?.to_str()?;
        extension.parse().ok()
    }
}

impl FromStr for DocFormat {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DocFormat::Json),
            "yaml" | "yml" => Ok(DocFormat::Yaml),
            "toml" => Ok(DocFormat::Toml),
            other => Err(ArborError::Configuration(format!(
                "unsupported document format '{other}' (expected json, yaml or toml)"
            ))),
        }
    }
}

impl Display for DocFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocFormat::Json => "json",
            DocFormat::Yaml => "yaml",
            DocFormat::Toml => "toml",
        };
        write!(f, "{name}")
    }
}

pub fn parse(text: &str, format: DocFormat) -> Result<Value, ArborError> {
    Ok(match format {
        DocFormat::Json => serde_json::from_str(text)?,
        DocFormat::Yaml => serde_yaml::from_str(text)?,
        DocFormat::Toml => serde_json::to_value(toml::from_str::<toml::Table>(text)?)?,
    })
}

/// Render a document. TOML requires a table at the root and has no null: null object entries
/// are dropped, null array items are an error.
pub fn emit(value: &Value, format: DocFormat) -> Result<String, ArborError> {
    match format {
        DocFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        DocFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        DocFormat::Toml => match value {
            Value::Object(map) => Ok(toml::to_string_pretty(&toml_table(map)?)?),
            other => Err(ArborError::Serialization(format!(
                "TOML documents must be tables, found {}",
                crate::shape::Shape::of(other).describe()
            ))),
        },
    }
}

fn toml_table(map: &Map<String, Value>) -> Result<toml::Table, ArborError> {
    let mut table = toml::Table::new();
    for (key, value) in map {
        if let Some(converted) = toml_value(value)? {
            table.insert(key.clone(), converted);
        }
    }
    Ok(table)
}

fn toml_value(value: &Value) -> Result<Option<toml::Value>, ArborError> {
    Ok(Some(match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => toml::Value::Integer(i),
            None => toml::Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Array(items) => toml::Value::Array(
            items
                .iter()
                .map(|item| {
                    toml_value(item)?.ok_or_else(|| {
                        ArborError::Serialization("TOML arrays cannot hold null".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => toml::Value::Table(toml_table(map)?),
    }))
}
