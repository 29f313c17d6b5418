//! Core types for the relink pipeline
//!
//! Defines the fundamental types:
//! - Id newtypes for universes, places, and packages
//! - Version numbers and the embed-time version marker
//! - Package links found by the scanner
//! - Per-place diffs and their staged artifacts

use relink_tree::{ContentHash, TreePath};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            /// The raw numeric id
            #[inline]
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

id_newtype! {
    /// Identifier of a universe (top-level project)
    UniverseId
}

id_newtype! {
    /// Identifier of a place within a universe
    PlaceId
}

id_newtype! {
    /// Identifier of an externally published package asset
    PackageId
}

id_newtype! {
    /// A published version number of a package asset
    Version
}

/// The version a PackageLink currently pins, if any
///
/// Links embedded without an explicit numeric version carry the platform's
/// "latest known at embed time" marker; those are treated as stale pending
/// a successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSpec {
    /// Explicit version number
    Pinned(Version),
    /// Embed-time marker, no explicit version recorded
    Embedded,
}

impl VersionSpec {
    /// The pinned version, if explicit
    #[inline]
    #[must_use]
    pub fn pinned(self) -> Option<Version> {
        match self {
            VersionSpec::Pinned(v) => Some(v),
            VersionSpec::Embedded => None,
        }
    }

    /// Whether this is the embed-time marker
    #[inline]
    #[must_use]
    pub fn is_embedded(self) -> bool {
        matches!(self, VersionSpec::Embedded)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Pinned(v) => write!(f, "v{v}"),
            VersionSpec::Embedded => write!(f, "embedded"),
        }
    }
}

/// A place as enumerated from the hosting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSummary {
    /// Stable place id
    pub id: PlaceId,
    /// Display name from the hosting service
    pub name: String,
}

impl PlaceSummary {
    /// Create a summary
    #[inline]
    #[must_use]
    pub fn new(id: PlaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A package reference found inside a place's object tree
///
/// The package id is never mutated; only the version is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLink {
    /// Owning place
    pub place: PlaceId,
    /// Node path within the tree, for precise rewrite targeting
    pub path: TreePath,
    /// Referenced package
    pub package: PackageId,
    /// Version currently embedded in the place
    pub current: VersionSpec,
}

/// One version rewrite within a place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkChange {
    /// Node path of the rewritten link
    pub path: TreePath,
    /// Referenced package
    pub package: PackageId,
    /// Version before the rewrite
    pub old: VersionSpec,
    /// Version after the rewrite
    pub new: Version,
}

impl fmt::Display for LinkChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "package {} {} -> v{} at {}",
            self.package, self.old, self.new, self.path
        )
    }
}

/// Staged pre/post image artifacts for one place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedArtifacts {
    /// Pre-update image on local disk
    pub pre_path: PathBuf,
    /// Content hash of the pre-image
    pub pre_hash: ContentHash,
    /// Post-update image on local disk
    pub post_path: PathBuf,
    /// Content hash of the post-image
    pub post_hash: ContentHash,
}

/// The set of link changes for one place, plus staged artifacts
///
/// An empty diff means the place is up to date; it is skipped at publish
/// time and no artifacts exist for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDiff {
    /// The place this diff belongs to
    pub place: PlaceId,
    /// Display name, carried for logs and the report
    pub name: String,
    /// Version rewrites, in tree order
    pub changes: Vec<LinkChange>,
    /// Staged artifacts; `None` iff `changes` is empty
    pub artifacts: Option<StagedArtifacts>,
}

impl PlaceDiff {
    /// An empty diff for an up-to-date place
    #[inline]
    #[must_use]
    pub fn unchanged(place: &PlaceSummary) -> Self {
        Self {
            place: place.id,
            name: place.name.clone(),
            changes: Vec::new(),
            artifacts: None,
        }
    }

    /// Whether the place needs no update
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of link changes
    #[inline]
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_and_parse() {
        let id: PlaceId = " 42 ".parse().unwrap();
        assert_eq!(id, PlaceId(42));
        assert_eq!(id.to_string(), "42");
        assert!("nope".parse::<PlaceId>().is_err());
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&PackageId(7)).unwrap(), "7");
    }

    #[test]
    fn version_spec_accessors() {
        assert_eq!(VersionSpec::Pinned(Version(3)).pinned(), Some(Version(3)));
        assert_eq!(VersionSpec::Embedded.pinned(), None);
        assert!(VersionSpec::Embedded.is_embedded());
        assert_eq!(VersionSpec::Pinned(Version(3)).to_string(), "v3");
        assert_eq!(VersionSpec::Embedded.to_string(), "embedded");
    }

    #[test]
    fn empty_diff_has_no_artifacts() {
        let diff = PlaceDiff::unchanged(&PlaceSummary::new(PlaceId(1), "Lobby"));
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
        assert!(diff.artifacts.is_none());
    }
}
