//! HTTP implementations of the relink collaborator traits
//!
//! Talks to the hosting platform's API surface:
//! - place enumeration with cursor pagination
//! - place and package content via asset-metadata indirection (metadata
//!   names a CDN location; content is downloaded from there)
//! - latest-version lookups for packages
//! - octet-stream place publishes
//!
//! Two underlying clients are kept deliberately separate: idempotent reads
//! go through retry middleware with exponential backoff on transient
//! failures, while publish uses a bare client with a timeout only - every
//! publish call creates a new hosted version, so it must never be retried
//! blindly.

pub mod auth;
pub mod http;
pub mod responses;

pub use auth::AuthContext;
pub use http::{ClientConfig, ClientError, HttpPlatformClient};
