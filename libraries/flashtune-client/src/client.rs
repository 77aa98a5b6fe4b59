//! Main FlashTune backend client.

use crate::error::{ClientError, Result};
use crate::types::{ClientConfig, HealthResponse};
use flashtune_core::{PlaylistInfo, SearchResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Metadata calls (search, playlist info) finish well within this
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the FlashTune backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl BackendClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let trimmed = config.url.trim();
        if trimmed.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let parsed = url::Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        // No overall timeout: downloads stream for as long as the transcoder runs
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("FlashTune/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: trimmed.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    /// The normalized base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of the download endpoint for a source locator
    pub fn download_url(&self, source_url: &str) -> String {
        format!(
            "{}/download?url={}",
            self.base_url,
            urlencoding::encode(source_url.trim())
        )
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        if self.api_key.is_empty() {
            request
        } else {
            request.header("X-API-Key", &self.api_key)
        }
    }

    /// Check that the backend is up. Does not need an API key.
    pub async fn health(&self) -> Result<HealthResponse> {
        let health: HealthResponse = self.get_json(self.get("/health")).await?;
        info!(status = %health.status, "Backend reachable");
        Ok(health)
    }

    /// Search for tracks
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        debug!(query = %query, "Searching");
        self.get_json(self.get("/search").query(&[("query", query)]))
            .await
    }

    /// Expand a playlist locator into its tracks
    pub async fn playlist_info(&self, url: &str) -> Result<PlaylistInfo> {
        debug!(url = %url, "Fetching playlist info");
        self.get_json(self.get("/playlist-info").query(&[("url", url)]))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
