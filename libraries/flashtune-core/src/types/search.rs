/// Search result types exchanged between backend and clients
use serde::{Deserialize, Serialize};

/// A single track found by the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub artist: String,
    pub duration_ms: i64,
    pub thumbnail_url: String,
    pub source_url: String,
}

/// Flat listing of a remote playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub track_count: usize,
    pub tracks: Vec<SearchResult>,
}

impl PlaylistInfo {
    /// Build the listing; `track_count` always matches `tracks`
    pub fn new(title: impl Into<String>, tracks: Vec<SearchResult>) -> Self {
        Self {
            title: title.into(),
            track_count: tracks.len(),
            tracks,
        }
    }
}
