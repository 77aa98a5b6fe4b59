/// Playlist domain types
use serde::{Deserialize, Serialize};

/// Playlist identifier (SQLite rowid)
pub type PlaylistId = i64;

/// User-defined named collection of songs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Playlist {
    /// Unique playlist identifier
    pub id: PlaylistId,

    /// Playlist name
    pub name: String,

    /// ISO 8601 creation timestamp
    pub created_at: String,
}

/// Membership of a song in a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct Membership {
    pub playlist_id: PlaylistId,
    pub song_id: crate::types::SongId,

    /// Manual ordering within the playlist, starting at 1
    pub position: i64,
}
