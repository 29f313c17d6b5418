//! Version resolution against the asset registry
//!
//! The resolver memoizes lookups per package id for the lifetime of a run:
//! the first caller for an id computes, concurrent callers for the same id
//! await the same cell, and the answer (success or failure) is sticky. That
//! guarantees exactly one registry query per distinct id per run, even when
//! many places referencing the same package are processed in parallel.

use crate::api::AssetRegistry;
use crate::error::RegistryError;
use crate::types::{LinkChange, PackageId, PackageLink, Version, VersionSpec};
use dashmap::DashMap;
use relink_tree::TreePath;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::OnceCell;

type MemoCell = Arc<OnceCell<Result<Version, RegistryError>>>;

/// Resolves package links to their latest published versions
pub struct VersionResolver {
    registry: Arc<dyn AssetRegistry>,
    memo: DashMap<PackageId, MemoCell>,
}

impl VersionResolver {
    /// Create a resolver with an empty run-scoped memo
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<dyn AssetRegistry>) -> Self {
        Self {
            registry,
            memo: DashMap::new(),
        }
    }

    /// Latest version of a package, memoized for the run
    ///
    /// # Errors
    /// The memoized [`RegistryError`] for this id; a failing id is queried
    /// once and every caller sees the same failure.
    pub async fn latest(&self, package: PackageId) -> Result<Version, RegistryError> {
        let cell = self
            .memo
            .entry(package)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| async {
            tracing::debug!(%package, "querying registry for latest version");
            self.registry.latest_version(package).await
        })
        .await
        .clone()
    }

    /// Resolve a batch of links
    ///
    /// Groups links by package id, issues at most one lookup per distinct
    /// id, and maps each answer back to every link sharing the id. The
    /// output is keyed by link path, so it is identical for any permutation
    /// of the input.
    pub async fn resolve(&self, links: &[PackageLink]) -> Resolution {
        let ids: BTreeSet<PackageId> = links.iter().map(|link| link.package).collect();
        let answers =
            futures::future::join_all(ids.iter().map(|&id| async move { (id, self.latest(id).await) }))
                .await;

        let mut latest = BTreeMap::new();
        let mut unresolved = BTreeMap::new();
        for (id, answer) in answers {
            match answer {
                Ok(version) => {
                    latest.insert(id, version);
                }
                Err(err) => {
                    tracing::warn!(package = %id, error = %err, "package left unresolved");
                    unresolved.insert(id, err);
                }
            }
        }

        let mut resolved = BTreeMap::new();
        for link in links {
            if let Some(&version) = latest.get(&link.package) {
                resolved.insert(link.path.clone(), version);
            }
        }

        Resolution {
            resolved,
            unresolved,
        }
    }
}

/// Outcome of resolving one batch of links
///
/// Unresolved package ids are neither stale nor fresh: their links are left
/// untouched and the failures are surfaced as run warnings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    resolved: BTreeMap<TreePath, Version>,
    unresolved: BTreeMap<PackageId, RegistryError>,
}

impl Resolution {
    /// Resolved latest version for a link, if its lookup succeeded
    #[inline]
    #[must_use]
    pub fn latest_for(&self, link: &PackageLink) -> Option<Version> {
        self.resolved.get(&link.path).copied()
    }

    /// Package ids whose lookup failed, with the cause
    #[inline]
    #[must_use]
    pub fn unresolved(&self) -> &BTreeMap<PackageId, RegistryError> {
        &self.unresolved
    }

    /// Whether a link points at an outdated version
    ///
    /// Pinned links are stale iff the registry's latest differs; embed-time
    /// links are stale whenever their lookup succeeded; unresolved links
    /// are never stale.
    #[must_use]
    pub fn is_stale(&self, link: &PackageLink) -> bool {
        match (self.latest_for(link), link.current) {
            (Some(latest), VersionSpec::Pinned(current)) => latest != current,
            (Some(_), VersionSpec::Embedded) => true,
            (None, _) => false,
        }
    }

    /// Version rewrites for every stale link, in input order
    #[must_use]
    pub fn stale_changes(&self, links: &[PackageLink]) -> Vec<LinkChange> {
        links
            .iter()
            .filter(|link| self.is_stale(link))
            .map(|link| LinkChange {
                path: link.path.clone(),
                package: link.package,
                old: link.current,
                new: self.resolved[&link.path],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaceId;
    use std::collections::HashMap;

    struct CountingRegistry {
        versions: HashMap<PackageId, Version>,
        failing: BTreeSet<PackageId>,
        calls: DashMap<PackageId, usize>,
    }

    impl CountingRegistry {
        fn new(versions: &[(u64, u64)], failing: &[u64]) -> Self {
            Self {
                versions: versions
                    .iter()
                    .map(|&(id, v)| (PackageId(id), Version(v)))
                    .collect(),
                failing: failing.iter().map(|&id| PackageId(id)).collect(),
                calls: DashMap::new(),
            }
        }

        fn calls_for(&self, id: u64) -> usize {
            self.calls.get(&PackageId(id)).map_or(0, |c| *c)
        }
    }

    #[async_trait::async_trait]
    impl AssetRegistry for CountingRegistry {
        async fn latest_version(&self, package: PackageId) -> Result<Version, RegistryError> {
            *self.calls.entry(package).or_insert(0) += 1;
            if self.failing.contains(&package) {
                return Err(RegistryError::Transport("connection reset".to_string()));
            }
            self.versions
                .get(&package)
                .copied()
                .ok_or(RegistryError::UnknownPackage(package))
        }
    }

    fn link(place: u64, path: &str, package: u64, current: Option<u64>) -> PackageLink {
        PackageLink {
            place: PlaceId(place),
            path: path.parse().unwrap(),
            package: PackageId(package),
            current: current.map_or(VersionSpec::Embedded, |v| VersionSpec::Pinned(Version(v))),
        }
    }

    #[tokio::test]
    async fn one_lookup_per_distinct_package() {
        let registry = Arc::new(CountingRegistry::new(&[(7, 5)], &[]));
        let resolver = VersionResolver::new(registry.clone());

        let links = vec![
            link(1, "0/0", 7, Some(3)),
            link(1, "0/1", 7, Some(5)),
            link(2, "0/0", 7, None),
        ];
        let resolution = resolver.resolve(&links).await;

        assert_eq!(registry.calls_for(7), 1);
        assert_eq!(resolution.latest_for(&links[0]), Some(Version(5)));
    }

    #[tokio::test]
    async fn memo_is_shared_across_concurrent_callers() {
        let registry = Arc::new(CountingRegistry::new(&[(9, 2)], &[]));
        let resolver = Arc::new(VersionResolver::new(registry.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move {
                resolver.latest(PackageId(9)).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(Version(2)));
        }
        assert_eq!(registry.calls_for(9), 1);
    }

    #[tokio::test]
    async fn failures_are_sticky_and_isolated() {
        let registry = Arc::new(CountingRegistry::new(&[(1, 4)], &[2]));
        let resolver = VersionResolver::new(registry.clone());

        let links = vec![link(1, "0/0", 1, Some(3)), link(1, "0/1", 2, Some(3))];
        let first = resolver.resolve(&links).await;
        let second = resolver.resolve(&links).await;

        assert_eq!(registry.calls_for(2), 1);
        assert!(first.unresolved().contains_key(&PackageId(2)));
        assert_eq!(first.unresolved(), second.unresolved());
        // the healthy id still resolved
        assert_eq!(first.latest_for(&links[0]), Some(Version(4)));
    }

    #[tokio::test]
    async fn up_to_date_links_are_never_stale() {
        let registry = Arc::new(CountingRegistry::new(&[(5, 3)], &[]));
        let resolver = VersionResolver::new(registry);

        let links = vec![link(1, "0/0", 5, Some(3))];
        let resolution = resolver.resolve(&links).await;

        assert!(!resolution.is_stale(&links[0]));
        assert!(resolution.stale_changes(&links).is_empty());
    }

    #[tokio::test]
    async fn embedded_links_are_stale_once_resolved() {
        let registry = Arc::new(CountingRegistry::new(&[(5, 3)], &[6]));
        let resolver = VersionResolver::new(registry);

        let links = vec![link(1, "0/0", 5, None), link(1, "0/1", 6, None)];
        let resolution = resolver.resolve(&links).await;

        let changes = resolution.stale_changes(&links);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].package, PackageId(5));
        assert_eq!(changes[0].old, VersionSpec::Embedded);
        assert_eq!(changes[0].new, Version(3));
        // the unresolved embedded link is left untouched
        assert!(!resolution.is_stale(&links[1]));
    }

    #[tokio::test]
    async fn resolution_is_order_independent() {
        let registry = Arc::new(CountingRegistry::new(&[(1, 9), (2, 4)], &[]));
        let resolver = VersionResolver::new(registry);

        let forward = vec![link(1, "0/0", 1, Some(3)), link(1, "0/1", 2, Some(4))];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();

        let a = resolver.resolve(&forward).await;
        let b = resolver.resolve(&reversed).await;
        assert_eq!(a, b);

        let mut changes_a = a.stale_changes(&forward);
        let mut changes_b = b.stale_changes(&reversed);
        changes_a.sort_by(|x, y| x.path.cmp(&y.path));
        changes_b.sort_by(|x, y| x.path.cmp(&y.path));
        assert_eq!(changes_a, changes_b);
    }
}
