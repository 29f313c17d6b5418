//! Confirmation-gated batch publish
//!
//! The coordinator applies staged rewrites back to the hosting service, one
//! place at a time, isolating failures so one rejected publish never blocks
//! the rest. Publishing is a billable, visible side effect: it only happens
//! after explicit confirmation, and it is never retried automatically.

use crate::api::PlaceRepository;
use crate::error::PublishError;
use crate::report::{FailureKind, PlaceOutcome};
use crate::types::{PlaceDiff, PlaceId};
use futures::StreamExt;
use relink_tree::PlaceDocument;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for an in-flight run
///
/// Once set, no new publish call is dispatched; calls already in flight
/// run to completion so no place is left half-published.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create an unset flag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Publishes staged diffs with per-place failure isolation
pub struct PublishCoordinator {
    places: Arc<dyn PlaceRepository>,
    workers: usize,
    cancel: CancelFlag,
}

impl PublishCoordinator {
    /// Create a coordinator publishing at most `workers` places at a time
    #[inline]
    #[must_use]
    pub fn new(places: Arc<dyn PlaceRepository>, workers: usize) -> Self {
        Self {
            places,
            workers,
            cancel: CancelFlag::new(),
        }
    }

    /// Wire in an external cancellation flag
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publish every nonempty diff, or stage-only when unconfirmed
    ///
    /// `confirmed == false` is the default dry-run gate: every nonempty
    /// diff is recorded `staged` and the repository is never touched.
    /// Empty diffs are always `unchanged` and never touch the network.
    pub async fn publish(
        &self,
        diffs: &[PlaceDiff],
        confirmed: bool,
    ) -> BTreeMap<PlaceId, PlaceOutcome> {
        let mut outcomes: BTreeMap<PlaceId, PlaceOutcome> = diffs
            .iter()
            .filter(|diff| diff.is_empty())
            .map(|diff| (diff.place, PlaceOutcome::Unchanged))
            .collect();

        let pending: Vec<&PlaceDiff> = diffs.iter().filter(|diff| !diff.is_empty()).collect();

        if !confirmed {
            tracing::info!(staged = pending.len(), "publish not confirmed, leaving diffs staged");
            for diff in pending {
                outcomes.insert(
                    diff.place,
                    PlaceOutcome::Staged {
                        changes: diff.change_count(),
                    },
                );
            }
            return outcomes;
        }

        let results: Vec<(PlaceId, PlaceOutcome)> = futures::stream::iter(pending.into_iter().map(
            |diff| async move {
                if self.cancel.is_cancelled() {
                    tracing::warn!(place = %diff.place, "cancelled before dispatch, leaving staged");
                    return (
                        diff.place,
                        PlaceOutcome::Staged {
                            changes: diff.change_count(),
                        },
                    );
                }
                (diff.place, self.publish_one(diff).await)
            },
        ))
        .buffer_unordered(self.workers.max(1))
        .collect()
        .await;

        outcomes.extend(results);
        outcomes
    }

    async fn publish_one(&self, diff: &PlaceDiff) -> PlaceOutcome {
        let document = match load_post_image(diff).await {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(place = %diff.place, error = %err, "post-image unusable");
                return PlaceOutcome::failed(FailureKind::Publish, err.to_string());
            }
        };

        match self.places.publish(diff.place, &document).await {
            Ok(()) => {
                tracing::info!(
                    place = %diff.place,
                    name = %diff.name,
                    changes = diff.change_count(),
                    "published place"
                );
                PlaceOutcome::Published {
                    changes: diff.change_count(),
                }
            }
            Err(err) => {
                tracing::warn!(place = %diff.place, name = %diff.name, error = %err, "publish failed");
                PlaceOutcome::failed(FailureKind::Publish, err.to_string())
            }
        }
    }
}

async fn load_post_image(diff: &PlaceDiff) -> Result<PlaceDocument, PublishError> {
    let artifacts = diff
        .artifacts
        .as_ref()
        .ok_or_else(|| PublishError::Artifact("no staged artifacts for nonempty diff".to_string()))?;
    let bytes = tokio::fs::read(&artifacts.post_path)
        .await
        .map_err(|err| {
            PublishError::Artifact(format!("{}: {err}", artifacts.post_path.display()))
        })?;
    PlaceDocument::from_json_slice(&bytes)
        .map_err(|err| PublishError::Artifact(format!("{}: {err}", artifacts.post_path.display())))
}
