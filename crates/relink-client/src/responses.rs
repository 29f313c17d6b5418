//! Response shapes of the hosting platform API

use serde::Deserialize;

/// One page of a universe's place listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacesPage {
    /// Cursor for the next page, absent on the last one
    pub next_page_cursor: Option<String>,
    /// Places on this page
    pub data: Vec<PlaceRecord>,
}

/// A place row in the listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    /// Stable place id
    pub id: u64,
    /// Display name
    pub name: String,
}

/// Asset delivery metadata for a place or package
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Available download locations by format
    pub locations: Vec<AssetLocation>,
}

impl AssetMetadata {
    /// CDN location of the `source` format, if present
    #[must_use]
    pub fn source_location(&self) -> Option<&str> {
        self.locations
            .iter()
            .find(|location| location.asset_format == "source")
            .map(|location| location.location.as_str())
    }
}

/// One download location in asset metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLocation {
    /// Serialization format served at this location
    pub asset_format: String,
    /// Download URL
    pub location: String,
}

/// Latest published version of a package asset
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVersionResponse {
    /// Version number of the newest published revision
    pub version_number: u64,
}
