//! Request and response types for the backend API.

use serde::{Deserialize, Serialize};

/// Backend connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://127.0.0.1:3000`
    pub url: String,

    /// Value sent in the `X-API-Key` header
    #[serde(default)]
    pub api_key: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: String::new(),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// `/health` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Progress of a running download
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written so far
    pub bytes_received: u64,

    /// Total size if the backend sent a length (it usually streams without one)
    pub bytes_total: Option<u64>,
}

impl DownloadProgress {
    /// Fraction done, `None` when the total is unknown
    pub fn fraction(&self) -> Option<f32> {
        self.bytes_total
            .filter(|total| *total > 0)
            .map(|total| self.bytes_received as f32 / total as f32)
    }
}
