//! Streaming download of `/download` into a local file.

use crate::client::BackendClient;
use crate::error::{ClientError, Result};
use crate::types::DownloadProgress;
use futures_util::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

impl BackendClient {
    /// Download the MP3 for `source_url` into `dest_path`.
    ///
    /// `progress` is called after every chunk. On failure the partial file is
    /// removed.
    pub async fn download_to<F>(
        &self,
        source_url: &str,
        dest_path: &Path,
        mut progress: F,
    ) -> Result<u64>
    where
        F: FnMut(DownloadProgress),
    {
        let locator = source_url.trim();
        debug!(locator = %locator, dest = %dest_path.display(), "Downloading track");

        let response = self
            .get("/download")
            .query(&[("url", locator)])
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        if !response.status().is_success() {
            return Err(ClientError::from_response(response).await);
        }

        let total_size = response.content_length();

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = write_body(response, dest_path, total_size, &mut progress).await;
        match result {
            Ok(0) => {
                let _ = tokio::fs::remove_file(dest_path).await;
                Err(ClientError::EmptyDownload)
            }
            Ok(size) => {
                info!(locator = %locator, dest = %dest_path.display(), size, "Track downloaded");
                Ok(size)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest_path).await;
                Err(e)
            }
        }
    }
}

async fn write_body<F>(
    response: reqwest::Response,
    dest_path: &Path,
    bytes_total: Option<u64>,
    progress: &mut F,
) -> Result<u64>
where
    F: FnMut(DownloadProgress),
{
    let mut file = File::create(dest_path).await?;
    let mut downloaded: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        progress(DownloadProgress {
            bytes_received: downloaded,
            bytes_total,
        });
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(downloaded)
}
