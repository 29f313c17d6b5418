//! HTTP client for the hosting platform
//!
//! Implements the core's collaborator traits over three API hosts: the
//! development API (place listings), asset delivery (content downloads and
//! version lookups), and the publish API. Idempotent reads ride a retrying
//! client with exponential backoff on transient failures; publish rides a
//! bare client because a publish call is never safe to repeat.

use crate::auth::AuthContext;
use crate::responses::{AssetMetadata, LatestVersionResponse, PlacesPage};
use flate2::read::GzDecoder;
use relink_core::api::{AssetRegistry, PlaceRepository};
use relink_core::error::{FetchError, PublishError, RegistryError};
use relink_core::types::{PackageId, PlaceId, PlaceSummary, UniverseId, Version};
use relink_tree::PlaceDocument;
use reqwest::cookie::Jar;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// Cookie carrying the authenticated session on every host
const SESSION_COOKIE: &str = "SESSION";
/// Page size for place enumeration
const PLACES_PAGE_LIMIT: u32 = 100;

/// Endpoints and transport tunables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Development API base, e.g. `https://develop.<domain>`
    pub places_api: String,
    /// Asset delivery base, e.g. `https://assetdelivery.<domain>`
    pub asset_api: String,
    /// Publish API base, e.g. `https://apis.<domain>`
    pub publish_api: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Bounded retry count for transient failures on idempotent reads
    pub max_retries: u32,
}

impl ClientConfig {
    /// Derive the standard API hosts from a platform domain
    ///
    /// # Errors
    /// [`ClientError::Url`] when the domain does not form valid URLs.
    pub fn for_domain(domain: &str) -> Result<Self, ClientError> {
        let config = Self {
            places_api: format!("https://develop.{domain}"),
            asset_api: format!("https://assetdelivery.{domain}"),
            publish_api: format!("https://apis.{domain}"),
            request_timeout_secs: 20,
            max_retries: 3,
        };
        for base in [&config.places_api, &config.asset_api, &config.publish_api] {
            Url::parse(base)?;
        }
        Ok(config)
    }

    /// With a per-request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// With a transient-retry bound
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Client construction failure
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An endpoint base is not a valid URL
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    /// The underlying HTTP client could not be built
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Authenticated client for the hosting platform
pub struct HttpPlatformClient {
    retrying: ClientWithMiddleware,
    bare: reqwest::Client,
    api_key: String,
    config: ClientConfig,
}

impl HttpPlatformClient {
    /// Build the client pair from config and auth material
    ///
    /// # Errors
    /// [`ClientError`] when an endpoint URL is invalid or the transport
    /// cannot be constructed.
    pub fn new(config: ClientConfig, auth: &AuthContext) -> Result<Self, ClientError> {
        let jar = Arc::new(Jar::default());
        if let Some(cookie) = auth.session_cookie() {
            for base in [&config.places_api, &config.asset_api, &config.publish_api] {
                let url = Url::parse(base)?;
                jar.add_cookie_str(&format!("{SESSION_COOKIE}={cookie}"), &url);
            }
        }

        let bare = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let retrying = reqwest_middleware::ClientBuilder::new(bare.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            retrying,
            bare,
            api_key: auth.api_key().to_string(),
            config,
        })
    }
}

#[async_trait::async_trait]
impl AssetRegistry for HttpPlatformClient {
    async fn latest_version(&self, package: PackageId) -> Result<Version, RegistryError> {
        let url = format!(
            "{}/v1/assets/{package}/versions/latest",
            self.config.asset_api
        );
        let response = self
            .retrying
            .get(&url)
            .send()
            .await
            .map_err(registry_error)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(RegistryError::UnknownPackage(package));
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                message: status_message(response).await,
            });
        }

        let latest: LatestVersionResponse = response
            .json()
            .await
            .map_err(|err| RegistryError::Decode(err.to_string()))?;
        tracing::debug!(%package, version = latest.version_number, "resolved latest version");
        Ok(Version(latest.version_number))
    }
}

#[async_trait::async_trait]
impl PlaceRepository for HttpPlatformClient {
    async fn list_places(&self, universe: UniverseId) -> Result<Vec<PlaceSummary>, FetchError> {
        let mut summaries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/v1/universes/{universe}/places?sortOrder=Asc&limit={PLACES_PAGE_LIMIT}",
                self.config.places_api
            );
            if let Some(cursor) = &cursor {
                url.push_str("&cursor=");
                url.push_str(cursor);
            }

            let response = self.retrying.get(&url).send().await.map_err(fetch_error)?;
            let response = ensure_fetch_status(response).await?;
            let page: PlacesPage = response
                .json()
                .await
                .map_err(|err| FetchError::Decode(err.to_string()))?;

            summaries.extend(
                page.data
                    .into_iter()
                    .map(|record| PlaceSummary::new(PlaceId(record.id), record.name)),
            );

            match page.next_page_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!(%universe, places = summaries.len(), "listed places");
        Ok(summaries)
    }

    async fn fetch_tree(&self, place: PlaceId) -> Result<PlaceDocument, FetchError> {
        let meta_url = format!("{}/v2/asset/?id={place}", self.config.asset_api);
        let response = self
            .retrying
            .get(&meta_url)
            .send()
            .await
            .map_err(fetch_error)?;
        let response = ensure_fetch_status(response).await?;
        let metadata: AssetMetadata = response
            .json()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;

        let location = metadata
            .source_location()
            .ok_or_else(|| FetchError::Decode("no source location in asset metadata".to_string()))?;

        tracing::debug!(%place, location, "downloading place content");
        let content = self
            .retrying
            .get(location)
            .send()
            .await
            .map_err(fetch_error)?;
        let content = ensure_fetch_status(content).await?;
        let bytes = decompress_if_needed(content).await?;

        PlaceDocument::from_json_slice(&bytes).map_err(|err| FetchError::Decode(err.to_string()))
    }

    async fn publish(&self, place: PlaceId, document: &PlaceDocument) -> Result<(), PublishError> {
        let bytes = document
            .to_json_vec()
            .map_err(|err| PublishError::Artifact(err.to_string()))?;
        let url = format!(
            "{}/v1/places/{place}/versions?versionType=Published",
            self.config.publish_api
        );

        let response = self
            .bare
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(publish_error)?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(%place, "published new place version");
            Ok(())
        } else {
            Err(PublishError::Rejected {
                status: status.as_u16(),
                message: status_message(response).await,
            })
        }
    }
}

fn fetch_error(err: reqwest_middleware::Error) -> FetchError {
    match err {
        reqwest_middleware::Error::Reqwest(err) => reqwest_fetch_error(err),
        reqwest_middleware::Error::Middleware(err) => FetchError::Transport(err.to_string()),
    }
}

fn reqwest_fetch_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

fn registry_error(err: reqwest_middleware::Error) -> RegistryError {
    match err {
        reqwest_middleware::Error::Reqwest(err) if err.is_timeout() => RegistryError::Timeout,
        reqwest_middleware::Error::Reqwest(err) => RegistryError::Transport(err.to_string()),
        reqwest_middleware::Error::Middleware(err) => RegistryError::Transport(err.to_string()),
    }
}

fn publish_error(err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::Timeout
    } else {
        PublishError::Transport(err.to_string())
    }
}

async fn ensure_fetch_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(FetchError::Status {
        status: status.as_u16(),
        message: status_message(response).await,
    })
}

async fn status_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    trimmed.chars().take(200).collect()
}

async fn decompress_if_needed(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    // the CDN sometimes serves gzip the transport does not unwrap
    let is_gzipped = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .map_or(false, |value| value == "gzip");

    let body = response.bytes().await.map_err(reqwest_fetch_error)?;
    if !is_gzipped {
        return Ok(body.to_vec());
    }

    let mut decompressed = Vec::new();
    GzDecoder::new(&body[..])
        .read_to_end(&mut decompressed)
        .map_err(|err| FetchError::Decode(format!("gzip: {err}")))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn domain_expands_to_standard_hosts() {
        let config = ClientConfig::for_domain("example.com").unwrap();
        assert_eq!(config.places_api, "https://develop.example.com");
        assert_eq!(config.asset_api, "https://assetdelivery.example.com");
        assert_eq!(config.publish_api, "https://apis.example.com");
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn rejects_unparseable_domains() {
        assert!(ClientConfig::for_domain("exa mple com").is_err());
    }

    #[test]
    fn transport_tunables_are_overridable() {
        let config = ClientConfig::for_domain("example.com")
            .unwrap()
            .with_request_timeout_secs(5)
            .with_max_retries(0);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn client_builds_with_and_without_cookie() {
        let config = ClientConfig::for_domain("example.com").unwrap();
        let bare_auth = AuthContext::new("key");
        assert!(HttpPlatformClient::new(config.clone(), &bare_auth).is_ok());

        let cookie_auth = AuthContext::new("key").with_session_cookie("value");
        let config = ClientConfig::for_domain("example.com").unwrap();
        assert!(HttpPlatformClient::new(config, &cookie_auth).is_ok());
    }
}
