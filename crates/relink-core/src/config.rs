//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum places processed (and published) concurrently
    pub workers: usize,
    /// Root directory run-stamped staging directories are created under
    pub staging_root: PathBuf,
}

impl PipelineConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a worker-pool bound
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// With a staging root
    #[inline]
    #[must_use]
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            staging_root: PathBuf::from("staged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PipelineConfig::new()
            .with_workers(8)
            .with_staging_root("/tmp/relink");
        assert_eq!(config.workers, 8);
        assert_eq!(config.staging_root, PathBuf::from("/tmp/relink"));
    }

    #[test]
    fn default_worker_bound_is_small() {
        assert_eq!(PipelineConfig::default().workers, 3);
    }
}
