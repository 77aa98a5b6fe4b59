//! Playlists vertical slice
//!
//! Membership is a set with a manual order: a song appears at most once per
//! playlist and is appended at `max(position) + 1`.

use crate::error::{Result, StorageError};
use chrono::Utc;
use flashtune_core::{Membership, Playlist, PlaylistId, Song, SongId};
use sqlx::SqlitePool;

/// Get all playlists, newest first
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<Playlist>> {
    let playlists = sqlx::query_as::<_, Playlist>(
        "SELECT id, name, created_at FROM playlists ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(playlists)
}

/// Get a playlist by ID
pub async fn get_by_id(pool: &SqlitePool, id: PlaylistId) -> Result<Option<Playlist>> {
    let playlist =
        sqlx::query_as::<_, Playlist>("SELECT id, name, created_at FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(playlist)
}

/// Create a playlist stamped with the current time
pub async fn create(pool: &SqlitePool, name: &str) -> Result<Playlist> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StorageError::InvalidInput(
            "playlist name is required".to_string(),
        ));
    }

    let created_at = Utc::now().to_rfc3339();
    let result = sqlx::query("INSERT INTO playlists (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(&created_at)
        .execute(pool)
        .await?;

    Ok(Playlist {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        created_at,
    })
}

/// Delete a playlist and its memberships. Returns `true` if it existed.
pub async fn delete(pool: &SqlitePool, id: PlaylistId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Append a song to a playlist.
///
/// Returns `false` when the song is already a member; its position is kept.
pub async fn add_song(pool: &SqlitePool, playlist_id: PlaylistId, song_id: SongId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let playlist_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM playlists WHERE id = ?)")
            .bind(playlist_id)
            .fetch_one(&mut *tx)
            .await?;
    if !playlist_exists {
        return Err(StorageError::not_found("Playlist", playlist_id));
    }

    let song_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM songs WHERE id = ?)")
        .bind(song_id)
        .fetch_one(&mut *tx)
        .await?;
    if !song_exists {
        return Err(StorageError::not_found("Song", song_id));
    }

    let next_position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM playlist_songs WHERE playlist_id = ?",
    )
    .bind(playlist_id)
    .fetch_one(&mut *tx)
    .await?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO playlist_songs (playlist_id, song_id, position) VALUES (?, ?, ?)",
    )
    .bind(playlist_id)
    .bind(song_id)
    .bind(next_position)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a song from a playlist. Absent memberships are not an error.
pub async fn remove_song(
    pool: &SqlitePool,
    playlist_id: PlaylistId,
    song_id: SongId,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
        .bind(playlist_id)
        .bind(song_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Songs of a playlist in playlist order
pub async fn get_songs(pool: &SqlitePool, playlist_id: PlaylistId) -> Result<Vec<Song>> {
    let songs = sqlx::query_as::<_, Song>(
        "SELECT s.id, s.title, s.artist, s.album, s.cover_path, s.source_url,
                s.filename, s.download_date, s.duration_ms
         FROM songs s
         INNER JOIN playlist_songs ps ON ps.song_id = s.id
         WHERE ps.playlist_id = ?
         ORDER BY ps.position ASC",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;
    Ok(songs)
}

/// Membership rows of a playlist in playlist order
pub async fn memberships(pool: &SqlitePool, playlist_id: PlaylistId) -> Result<Vec<Membership>> {
    let rows = sqlx::query_as::<_, Membership>(
        "SELECT playlist_id, song_id, position FROM playlist_songs
         WHERE playlist_id = ? ORDER BY position ASC",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// IDs of the playlists containing a song (no particular order)
pub async fn playlist_ids_for_song(pool: &SqlitePool, song_id: SongId) -> Result<Vec<PlaylistId>> {
    let ids: Vec<PlaylistId> =
        sqlx::query_scalar("SELECT playlist_id FROM playlist_songs WHERE song_id = ?")
            .bind(song_id)
            .fetch_all(pool)
            .await?;
    Ok(ids)
}
