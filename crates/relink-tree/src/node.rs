//! Tree nodes and property values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed property value on an instance
///
/// The hosting platform's place format carries a handful of scalar types;
/// package references live in `Content` values of the form
/// `asset://<digits>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Plain text
    String(String),
    /// Signed integer
    Number(i64),
    /// Boolean flag
    Bool(bool),
    /// Reference to an external asset, e.g. `asset://184994`
    Content(String),
}

impl PropertyValue {
    /// The content string, if this is a `Content` value
    #[inline]
    #[must_use]
    pub fn as_content(&self) -> Option<&str> {
        match self {
            PropertyValue::Content(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The numeric value, if this is a `Number`
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A node in an [`crate::InstanceTree`]
///
/// Properties are kept in a `BTreeMap` so serialization order is stable;
/// child order lives in the owning tree and follows document insertion
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Referent carried over from the wire document
    pub referent: String,
    /// Instance class, e.g. `Folder` or `PackageLink`
    pub class: String,
    /// Display name
    pub name: String,
    /// Typed properties
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Create a node with no properties
    #[inline]
    #[must_use]
    pub fn new(
        referent: impl Into<String>,
        class: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            referent: referent.into(),
            class: class.into(),
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Look up a property by name
    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Set a property, replacing any existing value
    #[inline]
    pub fn set_property(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_accessors() {
        assert_eq!(
            PropertyValue::Content("asset://1".to_string()).as_content(),
            Some("asset://1")
        );
        assert_eq!(PropertyValue::Number(7).as_number(), Some(7));
        assert_eq!(PropertyValue::Bool(true).as_content(), None);
    }

    #[test]
    fn node_property_round_trip() {
        let mut node = Node::new("r1", "PackageLink", "Deps");
        node.set_property("Version", PropertyValue::Number(3));
        assert_eq!(node.property("Version"), Some(&PropertyValue::Number(3)));
        node.set_property("Version", PropertyValue::Number(4));
        assert_eq!(node.property("Version"), Some(&PropertyValue::Number(4)));
    }

    #[test]
    fn property_value_serialization_is_tagged() {
        let json = serde_json::to_string(&PropertyValue::Content("asset://9".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"content","value":"asset://9"}"#);
    }
}
