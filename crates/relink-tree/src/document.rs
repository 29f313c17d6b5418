//! Flat wire format for place content
//!
//! The hosting platform serves and accepts a place as a flat list of
//! instances, each naming its parent by referent. [`PlaceDocument`] is that
//! shape plus the JSON encoding used for staged artifacts; hierarchy
//! validation happens when it is turned into an [`crate::InstanceTree`].

use crate::node::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One instance in the wire document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstance {
    /// Document-unique referent
    pub referent: String,
    /// Instance class, e.g. `Folder` or `PackageLink`
    pub class: String,
    /// Display name
    pub name: String,
    /// Parent referent; `None` marks a root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Typed properties, serialized in key order
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl RawInstance {
    /// Create an instance with no properties
    #[inline]
    #[must_use]
    pub fn new(
        referent: impl Into<String>,
        class: impl Into<String>,
        name: impl Into<String>,
        parent: Option<String>,
    ) -> Self {
        Self {
            referent: referent.into(),
            class: class.into(),
            name: name.into(),
            parent,
            properties: BTreeMap::new(),
        }
    }

    /// Add a property, builder style
    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A place's full content in wire form
///
/// Instance order is meaningful: children attach to their parents in the
/// order they appear here, and serialization preserves it, so the same
/// document always produces the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDocument {
    /// All instances, parents before or after their children
    pub instances: Vec<RawInstance>,
}

impl PlaceDocument {
    /// Create a document from instances
    #[inline]
    #[must_use]
    pub fn new(instances: Vec<RawInstance>) -> Self {
        Self { instances }
    }

    /// Number of instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the document has no instances
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Parse a document from JSON bytes
    ///
    /// # Errors
    /// Returns the underlying decode error for malformed JSON.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode the document as pretty-printed JSON
    ///
    /// Output is deterministic: instance order is preserved and properties
    /// serialize in key order, so the same document yields identical bytes.
    ///
    /// # Errors
    /// Returns the underlying encode error.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> PlaceDocument {
        PlaceDocument::new(vec![
            RawInstance::new("root", "DataModel", "Place", None),
            RawInstance::new("pkg", "PackageLink", "Deps", Some("root".to_string()))
                .with_property("PackageId", PropertyValue::Content("asset://7".to_string()))
                .with_property("Version", PropertyValue::Number(2)),
        ])
    }

    #[test]
    fn json_round_trip() {
        let doc = sample();
        let bytes = doc.to_json_vec().unwrap();
        let back = PlaceDocument::from_json_slice(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn encoding_is_deterministic() {
        let doc = sample();
        assert_eq!(doc.to_json_vec().unwrap(), doc.to_json_vec().unwrap());
    }

    #[test]
    fn roots_omit_parent_field() {
        let doc = PlaceDocument::new(vec![RawInstance::new("r", "DataModel", "Place", None)]);
        let text = String::from_utf8(doc.to_json_vec().unwrap()).unwrap();
        assert!(!text.contains("parent"));
    }
}
