//! Testing utilities for the relink workspace
//!
//! Shared stub collaborators and tree fixtures.

#![allow(missing_docs)]

use dashmap::DashMap;
use parking_lot::Mutex;
use relink_core::api::{AssetRegistry, ConfirmPublish, PlaceRepository};
use relink_core::error::{FetchError, PublishError, RegistryError};
use relink_core::types::{PackageId, PlaceDiff, PlaceId, PlaceSummary, UniverseId, Version};
use relink_tree::{PlaceDocument, PropertyValue, RawInstance};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Asset registry stub with fixed versions and per-id lookup counters.
#[derive(Default)]
pub struct StubRegistry {
    versions: DashMap<PackageId, Version>,
    failures: DashMap<PackageId, RegistryError>,
    calls: DashMap<PackageId, usize>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the latest published version for a package.
    pub fn set_version(&self, package: u64, version: u64) {
        self.versions.insert(PackageId(package), Version(version));
    }

    /// Make lookups for a package fail with the given error.
    pub fn fail_with(&self, package: u64, error: RegistryError) {
        self.failures.insert(PackageId(package), error);
    }

    /// How many times a package was looked up.
    pub fn lookup_count(&self, package: u64) -> usize {
        self.calls.get(&PackageId(package)).map_or(0, |c| *c)
    }

    /// Total lookups across all packages.
    pub fn total_lookups(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait::async_trait]
impl AssetRegistry for StubRegistry {
    async fn latest_version(&self, package: PackageId) -> Result<Version, RegistryError> {
        *self.calls.entry(package).or_insert(0) += 1;
        if let Some(err) = self.failures.get(&package) {
            return Err(err.value().clone());
        }
        self.versions
            .get(&package)
            .map(|v| *v)
            .ok_or(RegistryError::UnknownPackage(package))
    }
}

/// In-memory place repository with failure injection and a publish log.
#[derive(Default)]
pub struct MemoryPlaces {
    summaries: Mutex<Vec<PlaceSummary>>,
    trees: DashMap<PlaceId, PlaceDocument>,
    fetch_failures: DashMap<PlaceId, FetchError>,
    publish_failures: DashMap<PlaceId, PublishError>,
    list_failure: Mutex<Option<FetchError>>,
    published: Mutex<Vec<(PlaceId, PlaceDocument)>>,
    publish_calls: AtomicUsize,
}

impl MemoryPlaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place with its current content.
    pub fn add_place(&self, id: u64, name: &str, document: PlaceDocument) {
        self.summaries
            .lock()
            .push(PlaceSummary::new(PlaceId(id), name));
        self.trees.insert(PlaceId(id), document);
    }

    /// Make `fetch_tree` fail for one place.
    pub fn fail_fetch(&self, id: u64, error: FetchError) {
        self.fetch_failures.insert(PlaceId(id), error);
    }

    /// Make `publish` fail for one place.
    pub fn fail_publish(&self, id: u64, error: PublishError) {
        self.publish_failures.insert(PlaceId(id), error);
    }

    /// Make `list_places` fail for the whole run.
    pub fn fail_listing(&self, error: FetchError) {
        *self.list_failure.lock() = Some(error);
    }

    /// Places published so far, in call order.
    pub fn published(&self) -> Vec<(PlaceId, PlaceDocument)> {
        self.published.lock().clone()
    }

    /// Total publish calls, including rejected ones.
    pub fn publish_call_count(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlaceRepository for MemoryPlaces {
    async fn list_places(&self, _universe: UniverseId) -> Result<Vec<PlaceSummary>, FetchError> {
        if let Some(err) = self.list_failure.lock().clone() {
            return Err(err);
        }
        Ok(self.summaries.lock().clone())
    }

    async fn fetch_tree(&self, place: PlaceId) -> Result<PlaceDocument, FetchError> {
        if let Some(err) = self.fetch_failures.get(&place) {
            return Err(err.value().clone());
        }
        self.trees
            .get(&place)
            .map(|doc| doc.value().clone())
            .ok_or_else(|| FetchError::Status {
                status: 404,
                message: format!("no such place {place}"),
            })
    }

    async fn publish(&self, place: PlaceId, document: &PlaceDocument) -> Result<(), PublishError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.publish_failures.get(&place) {
            return Err(err.value().clone());
        }
        self.published.lock().push((place, document.clone()));
        Ok(())
    }
}

/// Confirmation stub answering a fixed yes/no and recording what it saw.
pub struct AutoConfirm {
    answer: bool,
    prompts: Mutex<Vec<usize>>,
}

impl AutoConfirm {
    pub fn yes() -> Self {
        Self {
            answer: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn no() -> Self {
        Self {
            answer: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Nonempty-diff counts seen per prompt.
    pub fn prompted_with(&self) -> Vec<usize> {
        self.prompts.lock().clone()
    }
}

#[async_trait::async_trait]
impl ConfirmPublish for AutoConfirm {
    async fn confirm(&self, diffs: &[PlaceDiff]) -> bool {
        let nonempty = diffs.iter().filter(|diff| !diff.is_empty()).count();
        self.prompts.lock().push(nonempty);
        self.answer
    }
}

/// A package node instance for fixture documents.
pub fn package_link_instance(
    referent: &str,
    parent: &str,
    package: u64,
    version: Option<i64>,
) -> RawInstance {
    let mut inst = RawInstance::new(
        referent,
        "PackageLink",
        referent,
        Some(parent.to_string()),
    )
    .with_property(
        "PackageId",
        PropertyValue::Content(format!("asset://{package}")),
    );
    if let Some(v) = version {
        inst = inst.with_property("Version", PropertyValue::Number(v));
    }
    inst
}

/// A minimal place document: one root with one package link per entry.
pub fn place_document(links: &[(u64, Option<i64>)]) -> PlaceDocument {
    let mut instances = vec![RawInstance::new("root", "DataModel", "Place", None)];
    for (i, &(package, version)) in links.iter().enumerate() {
        instances.push(package_link_instance(
            &format!("pkg{i}"),
            "root",
            package,
            version,
        ));
    }
    PlaceDocument::new(instances)
}

/// A place document containing a package node with no package id.
pub fn malformed_place_document() -> PlaceDocument {
    PlaceDocument::new(vec![
        RawInstance::new("root", "DataModel", "Place", None),
        RawInstance::new("bad", "PackageLink", "Broken", Some("root".to_string())),
    ])
}

/// A place document whose parent chain loops.
pub fn cyclic_place_document() -> PlaceDocument {
    PlaceDocument::new(vec![
        RawInstance::new("a", "Folder", "A", Some("b".to_string())),
        RawInstance::new("b", "Folder", "B", Some("a".to_string())),
    ])
}
