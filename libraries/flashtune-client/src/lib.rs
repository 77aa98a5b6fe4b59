//! FlashTune Backend Client
//!
//! HTTP client for the FlashTune backend.
//!
//! # Features
//!
//! - **Search**: query the extractor through `/search`
//! - **Playlists**: expand a playlist locator through `/playlist-info`
//! - **Download**: stream `/download` into a local file with progress reporting
//!
//! Every request carries the configured `X-API-Key` header.
//!
//! # Example
//!
//! ```ignore
//! use flashtune_client::{BackendClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BackendClient::new(ClientConfig::new("http://127.0.0.1:3000").with_api_key("secret"))?;
//!
//!     let results = client.search("daft punk").await?;
//!     let first = &results[0];
//!     client
//!         .download_to(&first.source_url, "/tmp/track.mp3".as_ref(), |p| {
//!             println!("{} bytes", p.bytes_received);
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

mod client;
mod download;
mod error;
mod types;

pub use client::BackendClient;
pub use error::{ClientError, Result};
pub use types::{ClientConfig, DownloadProgress, HealthResponse};
