//! Non-fatal conditions raised while reading or writing a [`Tree`](crate::tree::Tree).
//!
//! Diagnostics never abort an operation. They are logged through `tracing`, retained on the tree
//! (up to [`TreeConfig::max_diagnostics`](crate::config::TreeConfig)) and, where a caller asked
//! for something that does not exist, handed back as part of the return value.

use std::fmt::{Display, Formatter};

/// A positional lookup past the end of a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsWarning {
    /// Path of the set that was queried
    pub path: String,
    /// The requested zero-based position
    pub index: usize,
    /// Number of elements the set held at the time
    pub len: usize,
}

impl Display for BoundsWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index {} is out of bounds for '{}' ({} elements)",
            self.index, self.path, self.len
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    BoundsWarning(BoundsWarning),
    /// Input named a key the node does not declare, under [`UnknownKeyPolicy::Warn`](crate::config::UnknownKeyPolicy).
    UnknownKey { path: String, key: String },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::BoundsWarning(warning) => write!(f, "Warning: {warning}"),
            Diagnostic::UnknownKey { path, key } => {
                write!(f, "Warning: '{path}' has no child named '{key}', key ignored")
            }
        }
    }
}

impl From<BoundsWarning> for Diagnostic {
    fn from(warning: BoundsWarning) -> Self {
        Diagnostic::BoundsWarning(warning)
    }
}
