//! Run-level outcome reporting
//!
//! One [`PlaceOutcome`] per place plus run-level warnings, produced
//! incrementally and returned as the final output of a run. Renderable as a
//! human-readable summary or serialized for machine-readable logs; the exit
//! status of the CLI hangs off [`RunReport::has_failures`].

use crate::types::{PlaceId, UniverseId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which stage a place failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The place's object tree or a package node could not be interpreted
    MalformedTree,
    /// The place's content could not be downloaded
    Fetch,
    /// Local artifact staging failed
    Stage,
    /// The hosting service rejected or failed the publish
    Publish,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MalformedTree => "malformed-tree",
            FailureKind::Fetch => "fetch",
            FailureKind::Stage => "stage",
            FailureKind::Publish => "publish",
        };
        write!(f, "{label}")
    }
}

/// Terminal state of one place for this run
///
/// `scanned -> {unchanged | staged} -> (confirmed) -> {published | failed}`;
/// `unchanged` and `failed` are terminal, `staged` is terminal unless a
/// confirmed run follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaceOutcome {
    /// No stale links; nothing staged, nothing published
    Unchanged,
    /// Rewrites staged locally, not published
    Staged {
        /// Number of link changes staged
        changes: usize,
    },
    /// Rewrites published back to the hosting service
    Published {
        /// Number of link changes published
        changes: usize,
    },
    /// The place failed at some stage; others are unaffected
    Failed {
        /// Stage that failed
        kind: FailureKind,
        /// Operator-facing detail, enough to retry manually
        message: String,
    },
}

impl PlaceOutcome {
    /// Build a failed outcome
    #[inline]
    #[must_use]
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        PlaceOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Whether this place ended in failure
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, PlaceOutcome::Failed { .. })
    }
}

impl fmt::Display for PlaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceOutcome::Unchanged => write!(f, "unchanged"),
            PlaceOutcome::Staged { changes } => write!(f, "staged ({changes} links)"),
            PlaceOutcome::Published { changes } => write!(f, "published ({changes} links)"),
            PlaceOutcome::Failed { kind, message } => write!(f, "failed ({kind}) - {message}"),
        }
    }
}

/// One place's row in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceEntry {
    /// Display name from the hosting service
    pub name: String,
    /// Terminal outcome
    pub outcome: PlaceOutcome,
}

/// Aggregated outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Universe the run operated on
    pub universe: UniverseId,
    /// Stamp of the run's staging directory
    pub run_stamp: String,
    places: BTreeMap<PlaceId, PlaceEntry>,
    warnings: Vec<String>,
}

impl RunReport {
    /// Create an empty report
    #[inline]
    #[must_use]
    pub fn new(universe: UniverseId, run_stamp: impl Into<String>) -> Self {
        Self {
            universe,
            run_stamp: run_stamp.into(),
            places: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a place's terminal outcome, replacing any earlier state
    pub fn record(&mut self, place: PlaceId, name: impl Into<String>, outcome: PlaceOutcome) {
        self.places.insert(
            place,
            PlaceEntry {
                name: name.into(),
                outcome,
            },
        );
    }

    /// Append a run-level warning (e.g. an unresolved package id)
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Outcome for one place, if recorded
    #[inline]
    #[must_use]
    pub fn outcome(&self, place: PlaceId) -> Option<&PlaceOutcome> {
        self.places.get(&place).map(|entry| &entry.outcome)
    }

    /// All entries in place-id order
    pub fn entries(&self) -> impl Iterator<Item = (PlaceId, &PlaceEntry)> {
        self.places.iter().map(|(&id, entry)| (id, entry))
    }

    /// Run-level warnings
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn count(&self, pred: impl Fn(&PlaceOutcome) -> bool) -> usize {
        self.places.values().filter(|e| pred(&e.outcome)).count()
    }

    /// Number of places that ended `published`
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.count(|o| matches!(o, PlaceOutcome::Published { .. }))
    }

    /// Number of places that ended `staged`
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.count(|o| matches!(o, PlaceOutcome::Staged { .. }))
    }

    /// Number of places that ended `unchanged`
    #[must_use]
    pub fn unchanged_count(&self) -> usize {
        self.count(|o| matches!(o, PlaceOutcome::Unchanged))
    }

    /// Number of places that ended `failed`
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(PlaceOutcome::is_failed)
    }

    /// Whether any place ended in failure
    ///
    /// Drives the process exit status so partially failed runs are
    /// unmistakable.
    #[inline]
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Human-readable summary
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = format!(
            "universe {} run {}: {} published, {} staged, {} unchanged, {} failed\n",
            self.universe,
            self.run_stamp,
            self.published_count(),
            self.staged_count(),
            self.unchanged_count(),
            self.failure_count(),
        );
        for (id, entry) in self.entries() {
            out.push_str(&format!("  {} {}: {}\n", id, entry.name, entry.outcome));
        }
        if !self.warnings.is_empty() {
            out.push_str("warnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  - {warning}\n"));
            }
        }
        out
    }

    /// Machine-readable JSON rendering
    ///
    /// # Errors
    /// Returns the underlying encode error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
