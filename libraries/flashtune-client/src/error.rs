//! Error types for the backend client.

use thiserror::Error;

/// Errors that can occur when talking to the FlashTune backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend answered with an error status; `message` is its `{"error"}` text
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Missing or rejected API key
    #[error("Unauthorized: check the configured API key")]
    Unauthorized,

    /// Invalid backend URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse backend response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Backend is offline or unreachable
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// The download finished without a single byte
    #[error("Download produced no data")]
    EmptyDownload,

    /// IO error while writing a download
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Map a transport error, separating connectivity problems
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Request(err)
        }
    }

    /// Build the error for a non-success response
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        if status == 401 {
            return Self::Unauthorized;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);

        Self::Server { status, message }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
