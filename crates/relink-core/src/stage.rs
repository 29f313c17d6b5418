//! Local diff staging
//!
//! Writes a reviewable pre-image and post-image for every place that has at
//! least one stale link, under a run-stamped directory so artifacts from
//! different runs never collide. Staging is idempotent: the same inputs
//! produce byte-identical artifacts at the same paths, overwriting rather
//! than appending.

use crate::error::StageError;
use crate::scan::VERSION_PROPERTY;
use crate::types::{LinkChange, PlaceDiff, PlaceSummary, StagedArtifacts};
use relink_tree::{ContentHash, InstanceTree, PropertyValue};
use std::path::{Path, PathBuf};

/// Stages pre/post images of modified places on local disk
#[derive(Debug, Clone)]
pub struct DiffStager {
    run_dir: PathBuf,
}

impl DiffStager {
    /// Create a stager rooted at `<staging_root>/<run_stamp>/`
    #[inline]
    #[must_use]
    pub fn new(staging_root: impl AsRef<Path>, run_stamp: &str) -> Self {
        Self {
            run_dir: staging_root.as_ref().join(run_stamp),
        }
    }

    /// UTC stamp for a new run's staging directory
    #[must_use]
    pub fn run_stamp_now() -> String {
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
    }

    /// The run-scoped directory artifacts are written under
    #[inline]
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Stage one place
    ///
    /// With no changes this returns an empty [`PlaceDiff`] and performs no
    /// I/O at all. Otherwise the current tree is written as the pre-image,
    /// the rewrites are applied in memory, and the result is written as the
    /// post-image; both artifact hashes are recorded in the diff.
    ///
    /// # Errors
    /// [`StageError`] when encoding fails, a rewrite path does not address
    /// a node, or an artifact cannot be written.
    pub async fn stage(
        &self,
        place: &PlaceSummary,
        tree: &InstanceTree,
        changes: Vec<LinkChange>,
    ) -> Result<PlaceDiff, StageError> {
        if changes.is_empty() {
            return Ok(PlaceDiff::unchanged(place));
        }

        let pre_bytes = tree.to_document().to_json_vec()?;

        let mut updated = tree.clone();
        for change in &changes {
            updated
                .node_mut(&change.path)?
                .set_property(VERSION_PROPERTY, PropertyValue::Number(change.new.0 as i64));
        }
        let post_bytes = updated.to_document().to_json_vec()?;

        tokio::fs::create_dir_all(&self.run_dir)
            .await
            .map_err(|source| StageError::Io {
                path: self.run_dir.clone(),
                source,
            })?;

        let pre_path = self.run_dir.join(format!("place-{}.pre.json", place.id));
        let post_path = self.run_dir.join(format!("place-{}.post.json", place.id));
        write_artifact(&pre_path, &pre_bytes).await?;
        write_artifact(&post_path, &post_bytes).await?;

        tracing::info!(
            place = %place.id,
            name = %place.name,
            changes = changes.len(),
            dir = %self.run_dir.display(),
            "staged place images"
        );

        Ok(PlaceDiff {
            place: place.id,
            name: place.name.clone(),
            changes,
            artifacts: Some(StagedArtifacts {
                pre_hash: ContentHash::compute(&pre_bytes),
                pre_path,
                post_hash: ContentHash::compute(&post_bytes),
                post_path,
            }),
        })
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), StageError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PackageId, PlaceId, Version, VersionSpec};
    use relink_tree::{PlaceDocument, RawInstance};

    fn sample_tree() -> InstanceTree {
        InstanceTree::from_document(&PlaceDocument::new(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            RawInstance::new("pkg", "PackageLink", "Deps", Some("root".to_string()))
                .with_property("PackageId", PropertyValue::Content("asset://7".to_string()))
                .with_property("Version", PropertyValue::Number(3)),
        ]))
        .unwrap()
    }

    fn change(path: &str, new: u64) -> LinkChange {
        LinkChange {
            path: path.parse().unwrap(),
            package: PackageId(7),
            old: VersionSpec::Pinned(Version(3)),
            new: Version(new),
        }
    }

    fn summary() -> PlaceSummary {
        PlaceSummary::new(PlaceId(42), "Lobby")
    }

    #[tokio::test]
    async fn empty_changes_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DiffStager::new(dir.path(), "20260101T000000Z");

        let diff = stager.stage(&summary(), &sample_tree(), Vec::new()).await.unwrap();
        assert!(diff.is_empty());
        assert!(diff.artifacts.is_none());
        // not even the run directory is created
        assert!(!stager.run_dir().exists());
    }

    #[tokio::test]
    async fn stages_pre_and_post_images() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DiffStager::new(dir.path(), "20260101T000000Z");

        let diff = stager
            .stage(&summary(), &sample_tree(), vec![change("0/0", 5)])
            .await
            .unwrap();
        let artifacts = diff.artifacts.unwrap();

        let pre = tokio::fs::read(&artifacts.pre_path).await.unwrap();
        let post = tokio::fs::read(&artifacts.post_path).await.unwrap();
        assert_eq!(ContentHash::compute(&pre), artifacts.pre_hash);
        assert_eq!(ContentHash::compute(&post), artifacts.post_hash);
        assert_ne!(artifacts.pre_hash, artifacts.post_hash);

        let post_doc = PlaceDocument::from_json_slice(&post).unwrap();
        let post_tree = InstanceTree::from_document(&post_doc).unwrap();
        let node = post_tree.node(&"0/0".parse().unwrap()).unwrap();
        assert_eq!(node.property("Version"), Some(&PropertyValue::Number(5)));

        // pre-image still carries the old version
        let pre_doc = PlaceDocument::from_json_slice(&pre).unwrap();
        let pre_tree = InstanceTree::from_document(&pre_doc).unwrap();
        assert_eq!(
            pre_tree.node(&"0/0".parse().unwrap()).unwrap().property("Version"),
            Some(&PropertyValue::Number(3))
        );
    }

    #[tokio::test]
    async fn restaging_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DiffStager::new(dir.path(), "20260101T000000Z");
        let tree = sample_tree();

        let first = stager
            .stage(&summary(), &tree, vec![change("0/0", 5)])
            .await
            .unwrap();
        let second = stager
            .stage(&summary(), &tree, vec![change("0/0", 5)])
            .await
            .unwrap();

        assert_eq!(first, second);
        let a = first.artifacts.unwrap();
        let b = second.artifacts.unwrap();
        assert_eq!(a.post_path, b.post_path);
        assert_eq!(a.post_hash, b.post_hash);
        assert_eq!(
            tokio::fs::read(&a.post_path).await.unwrap(),
            tokio::fs::read(&b.post_path).await.unwrap()
        );
        // exactly one pre and one post image exist
        let entries = std::fs::read_dir(stager.run_dir()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[tokio::test]
    async fn unknown_rewrite_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DiffStager::new(dir.path(), "20260101T000000Z");

        let err = stager
            .stage(&summary(), &sample_tree(), vec![change("9/9", 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Tree(_)));
    }

    #[tokio::test]
    async fn inserts_version_property_for_embedded_links() {
        let dir = tempfile::tempdir().unwrap();
        let stager = DiffStager::new(dir.path(), "20260101T000000Z");

        let tree = InstanceTree::from_document(&PlaceDocument::new(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            RawInstance::new("pkg", "PackageLink", "Deps", Some("root".to_string()))
                .with_property("PackageId", PropertyValue::Content("asset://7".to_string())),
        ]))
        .unwrap();

        let diff = stager
            .stage(
                &summary(),
                &tree,
                vec![LinkChange {
                    path: "0/0".parse().unwrap(),
                    package: PackageId(7),
                    old: VersionSpec::Embedded,
                    new: Version(4),
                }],
            )
            .await
            .unwrap();

        let post = tokio::fs::read(&diff.artifacts.unwrap().post_path).await.unwrap();
        let post_tree =
            InstanceTree::from_document(&PlaceDocument::from_json_slice(&post).unwrap()).unwrap();
        assert_eq!(
            post_tree.node(&"0/0".parse().unwrap()).unwrap().property("Version"),
            Some(&PropertyValue::Number(4))
        );
    }
}
