//! Collaborator seams
//!
//! The pipeline core never talks to the network directly; it consumes these
//! traits. `relink-client` implements them over the hosting platform's HTTP
//! API, and `relink-test-utils` provides in-memory stubs. The auth context
//! is a client concern: implementations arrive already authenticated and
//! the core never sees credentials.

use crate::error::{FetchError, PublishError, RegistryError};
use crate::types::{PackageId, PlaceDiff, PlaceId, PlaceSummary, UniverseId, Version};
use relink_tree::PlaceDocument;

/// Resolves a package id to its latest published version
///
/// Idempotent; implementations may retry transient failures internally.
#[async_trait::async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Latest published version of a package
    ///
    /// # Errors
    /// [`RegistryError`] when the package is unknown or the lookup fails.
    async fn latest_version(&self, package: PackageId) -> Result<Version, RegistryError>;
}

/// Enumerates, fetches, and publishes places
#[async_trait::async_trait]
pub trait PlaceRepository: Send + Sync {
    /// All places belonging to a universe
    ///
    /// # Errors
    /// [`FetchError`] when enumeration fails; this aborts the run.
    async fn list_places(&self, universe: UniverseId) -> Result<Vec<PlaceSummary>, FetchError>;

    /// A place's current published content
    ///
    /// # Errors
    /// [`FetchError`] when the download fails; isolated to that place.
    async fn fetch_tree(&self, place: PlaceId) -> Result<PlaceDocument, FetchError>;

    /// Publish updated content for a place
    ///
    /// Not idempotent: every call creates a new published version on the
    /// hosting side, so callers must never retry blindly.
    ///
    /// # Errors
    /// [`PublishError`] when the hosting service rejects or fails the call.
    async fn publish(&self, place: PlaceId, document: &PlaceDocument) -> Result<(), PublishError>;
}

/// The explicit confirmation signal gating publish
///
/// The CLI implements this as an interactive prompt over the aggregate
/// diff set; tests use an auto-confirmer.
#[async_trait::async_trait]
pub trait ConfirmPublish: Send + Sync {
    /// Whether the operator approved publishing the given diffs
    async fn confirm(&self, diffs: &[PlaceDiff]) -> bool;
}
