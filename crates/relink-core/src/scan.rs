//! PackageLink discovery inside a place tree

use crate::error::{LinkDefect, MalformedLink};
use crate::types::{PackageId, PackageLink, PlaceId, Version, VersionSpec};
use relink_tree::{InstanceTree, Node, PropertyValue};

/// Instance class marking a package reference
pub const PACKAGE_LINK_CLASS: &str = "PackageLink";
/// Content property carrying the package id
pub const PACKAGE_ID_PROPERTY: &str = "PackageId";
/// Numeric property carrying the pinned version, absent for embed-time links
pub const VERSION_PROPERTY: &str = "Version";
/// Scheme prefix of package content ids
pub const ASSET_SCHEME: &str = "asset://";

/// Extracts every package reference from a place's object tree
///
/// Walks the tree pre-order depth-first, so output order is stable for a
/// given input and diffs built from it are reproducible across runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLinkScanner;

impl PackageLinkScanner {
    /// Create a scanner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lazily scan a tree for package links
    ///
    /// Yields one item per package node in traversal order. A node the
    /// scanner cannot interpret yields a [`MalformedLink`] and the scan
    /// continues; the iterator is restartable by calling `scan` again.
    pub fn scan<'a>(
        &self,
        place: PlaceId,
        tree: &'a InstanceTree,
    ) -> impl Iterator<Item = Result<PackageLink, MalformedLink>> + 'a {
        tree.walk().filter_map(move |(path, node)| {
            if node.class != PACKAGE_LINK_CLASS {
                return None;
            }
            Some(match extract(node) {
                Ok((package, current)) => Ok(PackageLink {
                    place,
                    path,
                    package,
                    current,
                }),
                Err(defect) => Err(MalformedLink { path, defect }),
            })
        })
    }

    /// Scan a tree and partition links from defects
    #[must_use]
    pub fn collect(
        &self,
        place: PlaceId,
        tree: &InstanceTree,
    ) -> (Vec<PackageLink>, Vec<MalformedLink>) {
        let mut links = Vec::new();
        let mut defects = Vec::new();
        for item in self.scan(place, tree) {
            match item {
                Ok(link) => links.push(link),
                Err(defect) => defects.push(defect),
            }
        }
        (links, defects)
    }
}

fn extract(node: &Node) -> Result<(PackageId, VersionSpec), LinkDefect> {
    let content = node
        .property(PACKAGE_ID_PROPERTY)
        .ok_or(LinkDefect::MissingPackageId)?
        .as_content()
        .ok_or(LinkDefect::MissingPackageId)?;

    let package = content
        .strip_prefix(ASSET_SCHEME)
        .and_then(|digits| digits.parse::<u64>().ok())
        .map(PackageId)
        .ok_or_else(|| LinkDefect::BadPackageId(content.to_string()))?;

    let current = match node.property(VERSION_PROPERTY) {
        None => VersionSpec::Embedded,
        Some(value) => {
            let n = value.as_number().ok_or(LinkDefect::BadVersion)?;
            let v = u64::try_from(n).map_err(|_| LinkDefect::BadVersion)?;
            VersionSpec::Pinned(Version(v))
        }
    };

    Ok((package, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_tree::{PlaceDocument, RawInstance};

    fn tree(instances: Vec<RawInstance>) -> InstanceTree {
        InstanceTree::from_document(&PlaceDocument::new(instances)).unwrap()
    }

    fn package_node(referent: &str, parent: &str, content: &str, version: Option<i64>) -> RawInstance {
        let mut inst = RawInstance::new(
            referent,
            PACKAGE_LINK_CLASS,
            referent,
            Some(parent.to_string()),
        )
        .with_property(
            PACKAGE_ID_PROPERTY,
            PropertyValue::Content(content.to_string()),
        );
        if let Some(v) = version {
            inst = inst.with_property(VERSION_PROPERTY, PropertyValue::Number(v));
        }
        inst
    }

    #[test]
    fn finds_links_in_traversal_order() {
        let tree = tree(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            RawInstance::new("models", "Folder", "Models", Some("root".to_string())),
            package_node("p1", "models", "asset://11", Some(3)),
            package_node("p2", "root", "asset://22", None),
        ]);

        let scanner = PackageLinkScanner::new();
        let (links, defects) = scanner.collect(PlaceId(5), &tree);
        assert!(defects.is_empty());
        assert_eq!(links.len(), 2);

        assert_eq!(links[0].package, PackageId(11));
        assert_eq!(links[0].current, VersionSpec::Pinned(Version(3)));
        assert_eq!(links[0].place, PlaceId(5));
        assert_eq!(links[0].path.to_string(), "0/0/0");

        assert_eq!(links[1].package, PackageId(22));
        assert_eq!(links[1].current, VersionSpec::Embedded);
        assert_eq!(links[1].path.to_string(), "0/1");
    }

    #[test]
    fn scan_is_restartable() {
        let tree = tree(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            package_node("p1", "root", "asset://11", Some(1)),
        ]);
        let scanner = PackageLinkScanner::new();
        assert_eq!(scanner.scan(PlaceId(1), &tree).count(), 1);
        assert_eq!(scanner.scan(PlaceId(1), &tree).count(), 1);
    }

    #[test]
    fn ignores_non_package_classes() {
        let tree = tree(vec![
            RawInstance::new("root", "Folder", "Stuff", None)
                .with_property("PackageId", PropertyValue::Content("asset://9".to_string())),
        ]);
        let (links, defects) = PackageLinkScanner::new().collect(PlaceId(1), &tree);
        assert!(links.is_empty());
        assert!(defects.is_empty());
    }

    #[test]
    fn missing_package_id_is_isolated_to_the_node() {
        let tree = tree(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            RawInstance::new("bad", PACKAGE_LINK_CLASS, "Broken", Some("root".to_string())),
            package_node("ok", "root", "asset://33", Some(2)),
        ]);

        let (links, defects) = PackageLinkScanner::new().collect(PlaceId(1), &tree);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].package, PackageId(33));
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].defect, LinkDefect::MissingPackageId);
        assert_eq!(defects[0].path.to_string(), "0/0");
    }

    #[test]
    fn rejects_unexpected_id_formats() {
        let tree = tree(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            package_node("p1", "root", "https://weird/9", Some(1)),
            package_node("p2", "root", "asset://not-digits", Some(1)),
        ]);

        let (links, defects) = PackageLinkScanner::new().collect(PlaceId(1), &tree);
        assert!(links.is_empty());
        assert_eq!(defects.len(), 2);
        assert!(matches!(defects[0].defect, LinkDefect::BadPackageId(_)));
        assert!(matches!(defects[1].defect, LinkDefect::BadPackageId(_)));
    }

    #[test]
    fn rejects_negative_versions() {
        let tree = tree(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            package_node("p1", "root", "asset://7", Some(-2)),
        ]);
        let (_, defects) = PackageLinkScanner::new().collect(PlaceId(1), &tree);
        assert_eq!(defects[0].defect, LinkDefect::BadVersion);
    }
}
