//! Download a search result onto the attached volume

use crate::error::{Result, UsbError};
use crate::library::{Library, MirrorStatus, Synced};
use crate::paths::music_file_uri;
use async_trait::async_trait;
use flashtune_client::BackendClient;
use flashtune_core::{NewSong, SearchResult, SongId};
use std::path::Path;
use tracing::{info, warn};

/// Source of MP3 data for a locator
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Write the audio for `source_url` to `dest`, returning the byte count
    async fn fetch(&self, source_url: &str, dest: &Path) -> Result<u64>;
}

#[async_trait]
impl TrackFetcher for BackendClient {
    async fn fetch(&self, source_url: &str, dest: &Path) -> Result<u64> {
        Ok(self.download_to(source_url, dest, |_| {}).await?)
    }
}

/// Steps of [`Library::download_and_save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Downloading,
    Downloaded,
    Copying,
    Recording,
    Done,
}

impl DownloadStage {
    /// Overall progress reached when the stage starts
    pub fn progress(self) -> f32 {
        match self {
            Self::Downloading => 0.1,
            Self::Downloaded => 0.5,
            Self::Copying => 0.7,
            Self::Recording => 0.9,
            Self::Done => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSong {
    /// `None` if the same source was recorded while this download ran
    pub song_id: Option<SongId>,
    pub filename: String,
    /// Location of the audio file on the volume
    pub uri: String,
    pub mirror: MirrorStatus,
}

impl Library {
    /// Download a track, copy it to `{root}/Music/` and record it.
    ///
    /// The temporary file in `temp_dir` is removed whatever happens.
    pub async fn download_and_save<F>(
        &self,
        fetcher: &dyn TrackFetcher,
        result: &SearchResult,
        temp_dir: &Path,
        mut on_stage: F,
    ) -> Result<SavedSong>
    where
        F: FnMut(DownloadStage) + Send,
    {
        let root = self.current_volume().await.ok_or(UsbError::NotAttached)?;

        if self.song_exists(&result.source_url).await? {
            return Err(UsbError::AlreadyExists {
                source_url: result.source_url.clone(),
            });
        }

        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| UsbError::io("create temp directory", temp_dir.display(), e))?;

        let song = NewSong::from_search(result);
        let temp_path = temp_dir.join(&song.filename);

        let saved = self
            .save(fetcher, &root, song, &temp_path, &mut on_stage)
            .await;

        match tokio::fs::remove_file(&temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %temp_path.display(), error = %e, "Could not remove temp file"),
        }

        saved
    }

    async fn save<F>(
        &self,
        fetcher: &dyn TrackFetcher,
        root: &str,
        song: NewSong,
        temp_path: &Path,
        on_stage: &mut F,
    ) -> Result<SavedSong>
    where
        F: FnMut(DownloadStage) + Send,
    {
        on_stage(DownloadStage::Downloading);
        let bytes = fetcher.fetch(&song.source_url, temp_path).await?;

        on_stage(DownloadStage::Downloaded);
        let uri = music_file_uri(root, &song.filename);

        on_stage(DownloadStage::Copying);
        self.provider().write_file(&uri, temp_path).await?;

        on_stage(DownloadStage::Recording);
        let filename = song.filename.clone();
        let Synced { value, mirror } = self.insert_song(song).await?;

        on_stage(DownloadStage::Done);
        info!(uri = %uri, bytes, song_id = ?value, "Song saved to volume");

        Ok(SavedSong {
            song_id: value,
            filename,
            uri,
            mirror,
        })
    }

    /// Remove a song's audio file from the volume, then its record.
    ///
    /// A file that is already gone is not an error.
    pub async fn delete_song_with_file(&self, id: SongId) -> Result<Synced<bool>> {
        let root = self.current_volume().await.ok_or(UsbError::NotAttached)?;

        if let Some(song) = self.get_song(id).await? {
            let uri = music_file_uri(&root, &song.filename);
            match self.provider().delete_file(&uri).await {
                Ok(()) => {}
                Err(UsbError::NotFound { .. }) => {
                    warn!(uri = %uri, "Audio file already missing from volume");
                }
                Err(e) => return Err(e),
            }
        }

        self.delete_song(id).await
    }
}
