/// Song domain types
use crate::error::{CoreError, Result};
use crate::types::SearchResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Song identifier (SQLite rowid)
pub type SongId = i64;

/// A downloaded track stored on the volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Song {
    /// Unique song identifier
    pub id: SongId,

    /// Track title
    pub title: String,

    /// Artist or uploader
    pub artist: String,

    /// Album name (empty when unknown)
    pub album: String,

    /// Path to the cover image (empty when none)
    pub cover_path: String,

    /// Normalized locator of the origin track, unique across songs
    pub source_url: String,

    /// File name relative to the music directory
    pub filename: String,

    /// ISO 8601 download timestamp
    pub download_date: String,

    /// Duration in milliseconds
    pub duration_ms: i64,
}

/// Data for inserting a new song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub cover_path: String,
    pub source_url: String,
    pub filename: String,
    pub download_date: String,
    #[serde(default)]
    pub duration_ms: i64,
}

impl NewSong {
    /// Create a song record stamped with the current time.
    ///
    /// The file name is derived as `"{artist} - {title}.mp3"` and sanitized.
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let artist = artist.into();
        let filename = sanitize_filename(&format!("{} - {}.mp3", artist, title));

        Self {
            title,
            artist,
            album: String::new(),
            cover_path: String::new(),
            source_url: source_url.into().trim().to_string(),
            filename,
            download_date: Utc::now().to_rfc3339(),
            duration_ms: 0,
        }
    }

    /// Build the record for a search result that is about to be downloaded
    pub fn from_search(result: &SearchResult) -> Self {
        Self::new(&result.title, &result.artist, &result.source_url)
            .with_duration_ms(result.duration_ms)
    }

    /// Set the duration
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms.max(0);
        self
    }

    /// Set the album
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    /// Override the download timestamp
    #[must_use]
    pub fn with_download_date(mut self, download_date: impl Into<String>) -> Self {
        self.download_date = download_date.into();
        self
    }

    /// Check the fields the database relies on
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(CoreError::MissingField("source_url"));
        }
        if self.filename.trim().is_empty() {
            return Err(CoreError::MissingField("filename"));
        }
        Ok(())
    }
}

/// Partial update for a song; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl SongPatch {
    /// True when no column would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.cover_path.is_none()
            && self.filename.is_none()
            && self.duration_ms.is_none()
    }
}

/// Replace characters that are not allowed in FAT/exFAT file names.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
