use crate::error::ArborError;
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

/// What deserialization does with an input key that names no declared child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    /// Fail the call with [`ArborError::UnknownChild`].
    Error,
    /// Record a [`Diagnostic::UnknownKey`](crate::diagnostic::Diagnostic) and keep going.
    #[default]
    Warn,
    /// Drop the key without a trace.
    Ignore,
}

pub const DEFAULT_MAX_DIAGNOSTICS: usize = 256;

/// Per-tree behavior switches. Usually authored as TOML:
///
/// ```toml
/// unknown_keys = "error"
/// max_diagnostics = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub unknown_keys: UnknownKeyPolicy,
    /// Oldest diagnostics are discarded once this many are retained.
    pub max_diagnostics: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            unknown_keys: UnknownKeyPolicy::default(),
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
        }
    }
}

impl TreeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ArborError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a config file. A missing file is not an error: the defaults apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArborError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read tree config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using default tree config.");
            return Ok(TreeConfig::default());
        }
        let content = read_to_string(path)?;
        TreeConfig::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ArborError> {
        Ok(toml::to_string(self)?)
    }
}
