//! Place object-tree data layer
//!
//! A place's content is served as a flat, referent-based document
//! ([`PlaceDocument`]). This crate turns it into an arena tree
//! ([`InstanceTree`]) whose nodes are addressed by stable child-index paths
//! ([`TreePath`]), walks it in pre-order, and flattens it back out for
//! staging and publishing. Construction validates the hierarchy: duplicate
//! referents, dangling parents, and cycles are rejected as [`TreeError`].

pub mod document;
pub mod error;
pub mod hash;
pub mod node;
pub mod path;
pub mod tree;

pub use document::{PlaceDocument, RawInstance};
pub use error::TreeError;
pub use hash::ContentHash;
pub use node::{Node, PropertyValue};
pub use path::TreePath;
pub use tree::InstanceTree;
