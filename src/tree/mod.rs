//! Tree module: the arena that owns every node of a document.
//!
//! # Module Organization
//!
//! - [`node`]: node identity and per-node state (`NodeId`, `Node`, `NodeKind`)
//! - [`base`]: the `Tree` arena, structural operations and the generic
//!   deserialize/serialize/update contract
//!
//! Variant-specific behavior lives next to the variant: [`crate::simple`], [`crate::complex`],
//! [`crate::nodeset`] and [`crate::nodelink`] each extend `Tree` with their own `impl` block.
//!
//! # Public API
//!
//! ```rust
//! use arbor_core::tree::{NodeId, NodeKind, Tree, SerializeOptions};
//! ```

mod base;
mod node;


pub use base::{NodeDisplay, SerializeOptions, Tree};
pub use node::{Node, NodeId, NodeKind, Variant};
