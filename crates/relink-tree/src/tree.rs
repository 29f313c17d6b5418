//! Arena tree built from a wire document
//!
//! [`InstanceTree`] owns nodes in a flat arena; hierarchy lives in child
//! index lists so nodes are addressed by [`TreePath`] rather than by
//! reference. Construction from a [`PlaceDocument`] validates the
//! hierarchy and rejects anything that is not a strict acyclic
//! parent-owns-children forest.

use crate::document::{PlaceDocument, RawInstance};
use crate::error::TreeError;
use crate::node::Node;
use crate::path::TreePath;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    node: Node,
    children: Vec<usize>,
}

/// A validated place tree
///
/// Children keep document insertion order, so pre-order walks - and
/// everything derived from them, like diffs - are reproducible across runs
/// on the same input.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceTree {
    slots: Vec<Slot>,
    roots: Vec<usize>,
}

impl InstanceTree {
    /// Build a tree from a wire document
    ///
    /// # Errors
    /// - [`TreeError::DuplicateReferent`] if two instances share a referent
    /// - [`TreeError::SelfParent`] if an instance is its own parent
    /// - [`TreeError::DanglingParent`] if a parent referent does not exist
    /// - [`TreeError::Cycle`] if the parent chain loops
    pub fn from_document(doc: &PlaceDocument) -> Result<Self, TreeError> {
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(doc.instances.len());
        for (idx, inst) in doc.instances.iter().enumerate() {
            if index_of.insert(inst.referent.as_str(), idx).is_some() {
                return Err(TreeError::DuplicateReferent(inst.referent.clone()));
            }
        }

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for idx in 0..doc.instances.len() {
            graph.add_node(idx);
        }
        for (idx, inst) in doc.instances.iter().enumerate() {
            let Some(parent_ref) = inst.parent.as_deref() else {
                continue;
            };
            if parent_ref == inst.referent {
                return Err(TreeError::SelfParent(inst.referent.clone()));
            }
            let parent_idx =
                *index_of
                    .get(parent_ref)
                    .ok_or_else(|| TreeError::DanglingParent {
                        child: inst.referent.clone(),
                        parent: parent_ref.to_string(),
                    })?;
            graph.add_edge(parent_idx, idx, ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            let referent = doc.instances[cycle.node_id()].referent.clone();
            return Err(TreeError::Cycle(referent));
        }

        let mut slots: Vec<Slot> = doc
            .instances
            .iter()
            .map(|inst| Slot {
                node: Node {
                    referent: inst.referent.clone(),
                    class: inst.class.clone(),
                    name: inst.name.clone(),
                    properties: inst.properties.clone(),
                },
                children: Vec::new(),
            })
            .collect();

        let mut roots = Vec::new();
        for (idx, inst) in doc.instances.iter().enumerate() {
            match inst.parent.as_deref() {
                Some(parent_ref) => {
                    let parent_idx = index_of[parent_ref];
                    slots[parent_idx].children.push(idx);
                }
                None => roots.push(idx),
            }
        }

        Ok(Self { slots, roots })
    }

    /// Flatten back to wire form, pre-order
    ///
    /// Referents are preserved, so flatten-then-rebuild yields an equal
    /// tree, and flattening the same tree twice yields identical documents.
    #[must_use]
    pub fn to_document(&self) -> PlaceDocument {
        let mut instances = Vec::with_capacity(self.slots.len());
        let mut stack: Vec<(usize, Option<usize>)> = self
            .roots
            .iter()
            .rev()
            .map(|&idx| (idx, None))
            .collect();

        while let Some((idx, parent_idx)) = stack.pop() {
            let slot = &self.slots[idx];
            instances.push(RawInstance {
                referent: slot.node.referent.clone(),
                class: slot.node.class.clone(),
                name: slot.node.name.clone(),
                parent: parent_idx.map(|p| self.slots[p].node.referent.clone()),
                properties: slot.node.properties.clone(),
            });
            for &child in slot.children.iter().rev() {
                stack.push((child, Some(idx)));
            }
        }

        PlaceDocument::new(instances)
    }

    /// Total node count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the tree has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index_at(&self, path: &TreePath) -> Option<usize> {
        let mut segments = path.segments().iter();
        let first = *segments.next()?;
        let mut idx = *self.roots.get(first)?;
        for &seg in segments {
            idx = *self.slots[idx].children.get(seg)?;
        }
        Some(idx)
    }

    /// Node at a path, if any
    #[inline]
    #[must_use]
    pub fn node(&self, path: &TreePath) -> Option<&Node> {
        self.index_at(path).map(|idx| &self.slots[idx].node)
    }

    /// Mutable node at a path
    ///
    /// # Errors
    /// [`TreeError::PathNotFound`] if the path does not address a node.
    pub fn node_mut(&mut self, path: &TreePath) -> Result<&mut Node, TreeError> {
        let idx = self
            .index_at(path)
            .ok_or_else(|| TreeError::PathNotFound(path.clone()))?;
        Ok(&mut self.slots[idx].node)
    }

    /// Pre-order depth-first walk in insertion order
    ///
    /// Lazy and restartable: each call returns a fresh iterator over
    /// `(path, node)` pairs. The order is stable for a given input
    /// document.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        let stack = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &idx)| (idx, TreePath::new(vec![i])))
            .collect();
        Walk { tree: self, stack }
    }
}

/// Pre-order iterator over an [`InstanceTree`]
#[derive(Debug)]
pub struct Walk<'a> {
    tree: &'a InstanceTree,
    stack: Vec<(usize, TreePath)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (TreePath, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, path) = self.stack.pop()?;
        let slot = &self.tree.slots[idx];
        for (i, &child) in slot.children.iter().enumerate().rev() {
            self.stack.push((child, path.child(i)));
        }
        Some((path, &slot.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyValue;
    use pretty_assertions::assert_eq;

    fn doc(instances: Vec<RawInstance>) -> PlaceDocument {
        PlaceDocument::new(instances)
    }

    fn inst(referent: &str, parent: Option<&str>) -> RawInstance {
        RawInstance::new(referent, "Folder", referent, parent.map(str::to_string))
    }

    #[test]
    fn builds_forest_in_document_order() {
        let tree = InstanceTree::from_document(&doc(vec![
            inst("a", None),
            inst("a1", Some("a")),
            inst("a2", Some("a")),
            inst("a1x", Some("a1")),
            inst("b", None),
        ]))
        .unwrap();

        let names: Vec<String> = tree.walk().map(|(_, n)| n.name.clone()).collect();
        assert_eq!(names, vec!["a", "a1", "a1x", "a2", "b"]);

        let paths: Vec<String> = tree.walk().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["0", "0/0", "0/0/0", "0/1", "1"]);
    }

    #[test]
    fn walk_is_restartable() {
        let tree = InstanceTree::from_document(&doc(vec![inst("a", None), inst("b", Some("a"))]))
            .unwrap();
        assert_eq!(tree.walk().count(), 2);
        assert_eq!(tree.walk().count(), 2);
    }

    #[test]
    fn rejects_duplicate_referent() {
        let err = InstanceTree::from_document(&doc(vec![inst("a", None), inst("a", None)]))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateReferent("a".to_string()));
    }

    #[test]
    fn rejects_dangling_parent() {
        let err =
            InstanceTree::from_document(&doc(vec![inst("a", Some("ghost"))])).unwrap_err();
        assert_eq!(
            err,
            TreeError::DanglingParent {
                child: "a".to_string(),
                parent: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn rejects_self_parent() {
        let err = InstanceTree::from_document(&doc(vec![inst("a", Some("a"))])).unwrap_err();
        assert_eq!(err, TreeError::SelfParent("a".to_string()));
    }

    #[test]
    fn rejects_parent_cycle() {
        let err = InstanceTree::from_document(&doc(vec![
            inst("a", Some("b")),
            inst("b", Some("a")),
        ]))
        .unwrap_err();
        assert!(matches!(err, TreeError::Cycle(_)));
    }

    #[test]
    fn node_mut_by_path_rewrites_in_place() {
        let mut tree = InstanceTree::from_document(&doc(vec![
            inst("a", None),
            RawInstance::new("pkg", "PackageLink", "Deps", Some("a".to_string()))
                .with_property("Version", PropertyValue::Number(3)),
        ]))
        .unwrap();

        let path: TreePath = "0/0".parse().unwrap();
        tree.node_mut(&path)
            .unwrap()
            .set_property("Version", PropertyValue::Number(5));
        assert_eq!(
            tree.node(&path).unwrap().property("Version"),
            Some(&PropertyValue::Number(5))
        );

        let missing: TreePath = "3/9".parse().unwrap();
        assert_eq!(
            tree.node_mut(&missing).unwrap_err(),
            TreeError::PathNotFound(missing)
        );
    }

    #[test]
    fn flatten_rebuild_round_trip() {
        let original = doc(vec![
            inst("a", None),
            inst("a1", Some("a")),
            inst("a2", Some("a")),
            inst("b", None),
        ]);
        let tree = InstanceTree::from_document(&original).unwrap();
        let flattened = tree.to_document();
        let rebuilt = InstanceTree::from_document(&flattened).unwrap();
        assert_eq!(rebuilt, tree);
        assert_eq!(
            flattened.to_json_vec().unwrap(),
            tree.to_document().to_json_vec().unwrap()
        );
    }

    #[test]
    fn empty_document_builds_empty_tree() {
        let tree = InstanceTree::from_document(&PlaceDocument::default()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.walk().count(), 0);
    }
}
