//! The pipeline driver
//!
//! Sequences scan -> resolve -> stage across all places of a universe with a
//! bounded worker pool, gathers the aggregate diff set, waits for the
//! external confirmation signal, then hands off to the publish coordinator.
//! Per-place failures are captured into the run report; the run as a whole
//! always completes. The only aborting conditions are rejected credentials
//! and a failed place enumeration.

use crate::api::{AssetRegistry, ConfirmPublish, PlaceRepository};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::publish::{CancelFlag, PublishCoordinator};
use crate::report::{FailureKind, PlaceOutcome, RunReport};
use crate::resolve::VersionResolver;
use crate::scan::PackageLinkScanner;
use crate::stage::DiffStager;
use crate::types::{PlaceDiff, PlaceSummary, UniverseId};
use futures::StreamExt;
use relink_tree::InstanceTree;
use std::collections::HashMap;
use std::sync::Arc;

struct Processed {
    summary: PlaceSummary,
    result: Result<PlaceDiff, (FailureKind, String)>,
    warnings: Vec<String>,
}

/// Drives one update-and-publish run over a universe
pub struct Pipeline {
    registry: Arc<dyn AssetRegistry>,
    places: Arc<dyn PlaceRepository>,
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl Pipeline {
    /// Create a pipeline over the given collaborators
    #[inline]
    #[must_use]
    pub fn new(
        registry: Arc<dyn AssetRegistry>,
        places: Arc<dyn PlaceRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            places,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for requesting an operator abort
    ///
    /// Cancellation stops dispatching new publish calls; in-flight calls
    /// finish so no place is left half-published.
    #[inline]
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the full pipeline with a fresh run stamp
    ///
    /// # Errors
    /// [`PipelineError`] only when authentication is rejected or the place
    /// listing fails; every other failure lands in the report.
    pub async fn run(
        &self,
        universe: UniverseId,
        confirm: &dyn ConfirmPublish,
    ) -> Result<RunReport, PipelineError> {
        let run_stamp = DiffStager::run_stamp_now();
        self.run_stamped(universe, confirm, &run_stamp).await
    }

    /// Run the full pipeline under an explicit run stamp
    ///
    /// # Errors
    /// See [`Pipeline::run`].
    pub async fn run_stamped(
        &self,
        universe: UniverseId,
        confirm: &dyn ConfirmPublish,
        run_stamp: &str,
    ) -> Result<RunReport, PipelineError> {
        let summaries = self
            .places
            .list_places(universe)
            .await
            .map_err(|err| {
                if err.is_auth_rejection() {
                    PipelineError::Auth(err)
                } else {
                    PipelineError::Enumerate {
                        universe,
                        source: err,
                    }
                }
            })?;
        tracing::info!(%universe, places = summaries.len(), "enumerated places");

        let mut report = RunReport::new(universe, run_stamp);
        let resolver = VersionResolver::new(Arc::clone(&self.registry));
        let stager = DiffStager::new(&self.config.staging_root, run_stamp);
        let scanner = PackageLinkScanner::new();

        let processed: Vec<Processed> = futures::stream::iter(summaries.into_iter().map(|summary| {
            let resolver = &resolver;
            let stager = &stager;
            async move { self.process_place(summary, scanner, resolver, stager).await }
        }))
        .buffer_unordered(self.config.workers.max(1))
        .collect()
        .await;

        let mut diffs: Vec<PlaceDiff> = Vec::new();
        for item in processed {
            for warning in item.warnings {
                report.warn(warning);
            }
            match item.result {
                Ok(diff) => diffs.push(diff),
                Err((kind, message)) => {
                    report.record(
                        item.summary.id,
                        item.summary.name,
                        PlaceOutcome::failed(kind, message),
                    );
                }
            }
        }
        // unordered buffering scrambles completion order; keep the report
        // and the confirmation view stable
        diffs.sort_by_key(|diff| diff.place);

        let confirmed = if diffs.iter().any(|diff| !diff.is_empty()) {
            confirm.confirm(&diffs).await
        } else {
            tracing::info!("no stale links anywhere, skipping confirmation");
            false
        };

        let names: HashMap<_, _> = diffs
            .iter()
            .map(|diff| (diff.place, diff.name.clone()))
            .collect();
        let coordinator = PublishCoordinator::new(Arc::clone(&self.places), self.config.workers)
            .with_cancel(self.cancel.clone());
        for (place, outcome) in coordinator.publish(&diffs, confirmed).await {
            let name = names.get(&place).cloned().unwrap_or_default();
            report.record(place, name, outcome);
        }

        tracing::info!(
            published = report.published_count(),
            staged = report.staged_count(),
            unchanged = report.unchanged_count(),
            failed = report.failure_count(),
            "run complete"
        );
        Ok(report)
    }

    async fn process_place(
        &self,
        summary: PlaceSummary,
        scanner: PackageLinkScanner,
        resolver: &VersionResolver,
        stager: &DiffStager,
    ) -> Processed {
        let mut warnings = Vec::new();
        let result = self
            .stage_place(&summary, scanner, resolver, stager, &mut warnings)
            .await;
        Processed {
            summary,
            result,
            warnings,
        }
    }

    async fn stage_place(
        &self,
        summary: &PlaceSummary,
        scanner: PackageLinkScanner,
        resolver: &VersionResolver,
        stager: &DiffStager,
        warnings: &mut Vec<String>,
    ) -> Result<PlaceDiff, (FailureKind, String)> {
        tracing::debug!(place = %summary.id, name = %summary.name, "fetching place content");
        let document = self
            .places
            .fetch_tree(summary.id)
            .await
            .map_err(|err| (FailureKind::Fetch, err.to_string()))?;

        let tree = InstanceTree::from_document(&document)
            .map_err(|err| (FailureKind::MalformedTree, err.to_string()))?;

        let (links, defects) = scanner.collect(summary.id, &tree);
        if let Some(first) = defects.first() {
            // a tree we could not fully interpret is never rewritten
            let message = if defects.len() == 1 {
                first.to_string()
            } else {
                format!("{first} (and {} more)", defects.len() - 1)
            };
            return Err((FailureKind::MalformedTree, message));
        }
        tracing::debug!(place = %summary.id, links = links.len(), "scanned package links");

        let resolution = resolver.resolve(&links).await;
        for (package, err) in resolution.unresolved() {
            warnings.push(format!(
                "package {package} unresolved for place {} ({}): {err}",
                summary.id, summary.name
            ));
        }

        let changes = resolution.stale_changes(&links);
        stager
            .stage(summary, &tree, changes)
            .await
            .map_err(|err| (FailureKind::Stage, err.to_string()))
    }
}
