//! Stable paths for addressing nodes within a place tree
//!
//! Provides [`TreePath`] for hierarchical addressing by child index.
//! Paths survive serialization round-trips and never alias: two distinct
//! nodes always have distinct paths, and the same input document always
//! yields the same path for the same node.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path to a node within an [`crate::InstanceTree`]
///
/// Each segment is the index of a child in its parent's insertion-ordered
/// child list; the first segment indexes the tree's root list.
///
/// # Examples
/// - `[]` → the root list itself (no node)
/// - `[0]` → first root
/// - `[0, 2, 1]` → `0/2/1`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// Create a path from index segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<usize>) -> Self {
        Self(segments)
    }

    /// Empty path (the root list)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get the index segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[usize] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the empty root path
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent path, if any
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last segment, if any
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Append a child index, returning the extended path
    #[inline]
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut new = self.clone();
        new.0.push(index);
        new
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

/// Error parsing a [`TreePath`] from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path segment: {0}")]
pub struct PathParseError(String);

impl FromStr for TreePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let segments = trimmed
            .split('/')
            .map(|seg| {
                seg.parse::<usize>()
                    .map_err(|_| PathParseError(seg.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display_round_trip() {
        let path = TreePath::new(vec![0, 2, 1]);
        assert_eq!(path.to_string(), "0/2/1");
        assert_eq!("0/2/1".parse::<TreePath>().unwrap(), path);
    }

    #[test]
    fn root_path_is_empty() {
        let root = TreePath::root();
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "/");
        assert_eq!("/".parse::<TreePath>().unwrap(), root);
    }

    #[test]
    fn path_parent_and_child() {
        let path = TreePath::new(vec![1, 3]);
        assert_eq!(path.parent(), Some(TreePath::new(vec![1])));
        assert_eq!(path.child(0), TreePath::new(vec![1, 3, 0]));
        assert_eq!(TreePath::root().parent(), None);
    }

    #[test]
    fn path_rejects_non_numeric_segments() {
        assert!("0/a/1".parse::<TreePath>().is_err());
    }

    #[test]
    fn path_ordering_is_lexicographic() {
        let a = TreePath::new(vec![0, 1]);
        let b = TreePath::new(vec![0, 2]);
        let c = TreePath::new(vec![1]);
        assert!(a < b);
        assert!(b < c);
    }
}
