use std::{fmt, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;

fn bounds(min: &Option<f64>, max: &Option<f64>) -> String {
    let lower = min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string());
    let upper = max.map(|v| v.to_string()).unwrap_or_else(|| "inf".to_string());
    format!("[{lower}, {upper}]")
}

/// Every fatal condition the engine can raise. Variants that concern a node carry its path (see
/// [`crate::tree::Tree::path`]) so messages point straight at the offending document location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ArborError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Value {value} at '{path}' is outside the range {}", bounds(.min, .max))]
    RangeViolation {
        path: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[error("Value '{value}' at '{path}' is not one of: {}", .options.join(", "))]
    InvalidOption {
        path: String,
        value: String,
        options: Vec<String>,
    },
    #[error("Unknown child type tag '{tag}' for set '{path}'")]
    UnknownChildType { path: String, tag: String },
    #[error("'{path}' has no child named '{key}'")]
    UnknownChild { path: String, key: String },
    #[error("Reference '{reference}' from link '{path}' does not resolve")]
    InvalidReference { path: String, reference: String },
    #[error("Link '{path}' expects an inverse link '{inverse}' on '{target}', none found")]
    InvalidInverseLink {
        path: String,
        target: String,
        inverse: String,
    },
    #[error("Cannot deserialize {found} into '{path}' (expected {expected})")]
    InvalidShape {
        path: String,
        expected: String,
        found: String,
    },
    #[error("Link '{path}' accepts only an array of reference names, received {found}")]
    InvalidLinkData { path: String, found: String },
    #[error("Invalid color format '{input}' at '{path}'")]
    InvalidColorFormat { path: String, input: String },
    #[error("Tag '{tag}' is already registered under node type '{parent}'")]
    DuplicateTag { parent: String, tag: String },
    #[error("Node type '{0}' is already registered")]
    DuplicateType(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
}

impl ArborError {
    /// True for the document-integrity failures raised while resolving cross references.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            ArborError::InvalidReference { .. } | ArborError::InvalidInverseLink { .. }
        )
    }
}

impl From<toml::de::Error> for ArborError {
    fn from(src: toml::de::Error) -> ArborError {
        ArborError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ArborError {
    fn from(src: toml::ser::Error) -> ArborError {
        ArborError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for ArborError {
    fn from(src: JsonError) -> ArborError {
        ArborError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<YamlError> for ArborError {
    fn from(src: YamlError) -> ArborError {
        ArborError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<io::Error> for ArborError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ArborError::NotFound(format!("{x}")),
            _ => ArborError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for ArborError {
    fn from(x: fmt::Error) -> Self {
        ArborError::Serialization(format!("{x}"))
    }
}
