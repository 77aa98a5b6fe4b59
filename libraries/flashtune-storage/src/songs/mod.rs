//! Songs vertical slice
//!
//! `source_url` is unique: inserting a song that was already downloaded is a
//! silent no-op and leaves the existing row untouched.

use crate::error::Result;
use flashtune_core::{NewSong, Song, SongId, SongPatch};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SONG_COLUMNS: &str =
    "id, title, artist, album, cover_path, source_url, filename, download_date, duration_ms";

/// Get all songs, newest download first
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<Song>> {
    let sql = format!(
        "SELECT {} FROM songs ORDER BY download_date DESC, id DESC",
        SONG_COLUMNS
    );
    let songs = sqlx::query_as::<_, Song>(&sql).fetch_all(pool).await?;
    Ok(songs)
}

/// Get a song by ID
pub async fn get_by_id(pool: &SqlitePool, id: SongId) -> Result<Option<Song>> {
    let sql = format!("SELECT {} FROM songs WHERE id = ?", SONG_COLUMNS);
    let song = sqlx::query_as::<_, Song>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(song)
}

/// Get a song by its source locator
pub async fn get_by_source(pool: &SqlitePool, source_url: &str) -> Result<Option<Song>> {
    let sql = format!("SELECT {} FROM songs WHERE source_url = ?", SONG_COLUMNS);
    let song = sqlx::query_as::<_, Song>(&sql)
        .bind(source_url.trim())
        .fetch_optional(pool)
        .await?;
    Ok(song)
}

/// Check whether a song with this source locator exists
pub async fn exists_by_source(pool: &SqlitePool, source_url: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM songs WHERE source_url = ?)")
        .bind(source_url.trim())
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Insert a song.
///
/// Returns the new ID, or `None` when a song with the same `source_url`
/// already exists (the existing row is left unchanged).
pub async fn insert(pool: &SqlitePool, song: &NewSong) -> Result<Option<SongId>> {
    song.validate()?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO songs
            (title, artist, album, cover_path, source_url, filename, download_date, duration_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.album)
    .bind(&song.cover_path)
    .bind(song.source_url.trim())
    .bind(&song.filename)
    .bind(&song.download_date)
    .bind(song.duration_ms)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(source_url = %song.source_url, "Song already in library, insert ignored");
        return Ok(None);
    }

    Ok(Some(result.last_insert_rowid()))
}

/// Apply a partial update. Returns `true` if a row changed.
///
/// An empty patch touches nothing and returns `false`.
pub async fn update(pool: &SqlitePool, id: SongId, patch: &SongPatch) -> Result<bool> {
    if patch.is_empty() {
        return Ok(false);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE songs SET ");
    let mut columns = builder.separated(", ");
    if let Some(title) = &patch.title {
        columns.push("title = ").push_bind_unseparated(title.clone());
    }
    if let Some(artist) = &patch.artist {
        columns.push("artist = ").push_bind_unseparated(artist.clone());
    }
    if let Some(album) = &patch.album {
        columns.push("album = ").push_bind_unseparated(album.clone());
    }
    if let Some(cover_path) = &patch.cover_path {
        columns.push("cover_path = ").push_bind_unseparated(cover_path.clone());
    }
    if let Some(filename) = &patch.filename {
        columns.push("filename = ").push_bind_unseparated(filename.clone());
    }
    if let Some(duration_ms) = patch.duration_ms {
        columns.push("duration_ms = ").push_bind_unseparated(duration_ms);
    }
    builder.push(" WHERE id = ").push_bind(id);

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a song and its playlist memberships. Returns `true` if it existed.
pub async fn delete(pool: &SqlitePool, id: SongId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_songs WHERE song_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Number of songs in the library
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
