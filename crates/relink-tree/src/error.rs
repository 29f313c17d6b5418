//! Tree construction and addressing errors

use crate::path::TreePath;

/// Malformed place document or bad tree address
///
/// All variants indicate input that must not be rewritten or republished;
/// callers isolate the failure to the offending place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Two instances share a referent
    #[error("duplicate referent {0}")]
    DuplicateReferent(String),

    /// An instance names a parent that does not exist in the document
    #[error("instance {child} points at missing parent {parent}")]
    DanglingParent { child: String, parent: String },

    /// An instance is its own parent
    #[error("instance {0} is its own parent")]
    SelfParent(String),

    /// The parent chain loops back on itself
    #[error("cycle detected through instance {0}")]
    Cycle(String),

    /// No node exists at the given path
    #[error("no node at path {0}")]
    PathNotFound(TreePath),
}
