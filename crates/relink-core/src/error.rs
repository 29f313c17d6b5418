//! Error types for the relink pipeline
//!
//! One enum per failure domain:
//! - Malformed package links found while scanning
//! - Registry lookup failures (per package id)
//! - Place fetch/enumeration failures
//! - Publish failures (per place)
//! - Staging failures (local I/O)
//! - Run-aborting pipeline failures
//!
//! Per-place and per-package errors never abort a run; they are captured
//! into the run report. Transient remote failures are retried at the
//! transport layer; semantic errors are not.

use crate::types::{PackageId, UniverseId};
use relink_tree::{TreeError, TreePath};
use std::path::PathBuf;

/// What is wrong with a package node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkDefect {
    /// Package node has no package id property at all
    #[error("package node without a PackageId property")]
    MissingPackageId,

    /// Package id property exists but is not `asset://<digits>`
    #[error("package id had unexpected format '{0}'")]
    BadPackageId(String),

    /// Version property exists but is not a non-negative number
    #[error("version property is not a non-negative number")]
    BadVersion,
}

/// A package node the scanner could not interpret
///
/// Isolated to one node; the scan keeps going, but the pipeline refuses to
/// rewrite a place whose tree it could not fully interpret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed package link at {path}: {defect}")]
pub struct MalformedLink {
    /// Node path of the offending package node
    pub path: TreePath,
    /// What was wrong with it
    pub defect: LinkDefect,
}

/// Registry lookup failure for one package id
///
/// Cloneable so the resolver can memoize a failure and hand the same answer
/// to every link sharing the id without re-querying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry does not know this package
    #[error("package {0} is not known to the registry")]
    UnknownPackage(PackageId),

    /// Lookup timed out
    #[error("registry lookup timed out")]
    Timeout,

    /// Registry answered with an error status
    #[error("registry returned {status}: {message}")]
    Status {
        /// HTTP-style status code
        status: u16,
        /// Error detail from the registry
        message: String,
    },

    /// Connection-level failure
    #[error("registry transport failure: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("malformed registry response: {0}")]
    Decode(String),
}

impl RegistryError {
    /// Whether retrying may help
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Timeout | RegistryError::Transport(_) => true,
            RegistryError::Status { status, .. } => *status >= 500,
            RegistryError::UnknownPackage(_) | RegistryError::Decode(_) => false,
        }
    }
}

/// Failure fetching place data from the hosting service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Service answered with an error status
    #[error("service returned {status}: {message}")]
    Status {
        /// HTTP-style status code
        status: u16,
        /// Error detail from the service
        message: String,
    },

    /// Connection-level failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether retrying may help
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Decode(_) => false,
        }
    }

    /// Whether the service rejected our credentials
    #[inline]
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, FetchError::Status { status: 401 | 403, .. })
    }
}

/// Failure publishing one place
///
/// Publishing is never retried automatically: each call creates a new
/// hosted version, so the operator retries manually off the report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Publish call timed out
    #[error("publish timed out")]
    Timeout,

    /// Hosting service rejected or failed the publish
    #[error("hosting service returned {status}: {message}")]
    Rejected {
        /// HTTP-style status code
        status: u16,
        /// Error detail from the service
        message: String,
    },

    /// Connection-level failure
    #[error("publish transport failure: {0}")]
    Transport(String),

    /// The staged post-image could not be read back
    #[error("staged artifact unreadable: {0}")]
    Artifact(String),
}

/// Failure staging a place's pre/post images locally
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Artifact write failed
    #[error("failed to write staged artifact {path}: {source}")]
    Io {
        /// Artifact path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Place document could not be encoded
    #[error("failed to encode place document: {0}")]
    Encode(#[from] serde_json::Error),

    /// A rewrite path did not address a node
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Run-aborting failures
///
/// The only conditions that abort a whole run: without authentication or a
/// place listing there is nothing to iterate over. Everything else is
/// captured per place into the run report.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Credentials were rejected by the hosting service
    #[error("authentication rejected by the hosting service: {0}")]
    Auth(FetchError),

    /// Place enumeration failed
    #[error("failed to enumerate places for universe {universe}: {source}")]
    Enumerate {
        /// Universe that could not be enumerated
        universe: UniverseId,
        /// Underlying fetch failure
        #[source]
        source: FetchError,
    },
}
