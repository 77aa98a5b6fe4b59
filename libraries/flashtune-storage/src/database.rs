/// Database handle
use crate::error::{Result, StorageError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// `SQLite` library database backed by a single connection
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema.
    ///
    /// The rollback journal (`DELETE` mode) keeps all committed data in the
    /// main file, and `synchronous = FULL` makes every commit durable.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or migrations fail
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = Self::connect(options).await?;
        Self::run_migrations(&pool).await?;

        tracing::debug!(path = %path.display(), "Opened library database");

        Ok(Self {
            pool,
            path: Some(path),
        })
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = Self::connect(options).await?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool, path: None })
    }

    async fn connect(options: SqliteConnectOptions) -> Result<SqlitePool> {
        // One connection that never expires; an in-memory database lives
        // exactly as long as it does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection, releasing the file
    pub async fn close(self) {
        self.pool.close().await;
        if let Some(path) = &self.path {
            tracing::debug!(path = %path.display(), "Closed library database");
        }
    }

    /// Run database migrations
    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        // Embedded migrations, all idempotent
        const MIGRATIONS: &[&str] = &[
            include_str!("../migrations/20250301000001_create_songs.sql"),
            include_str!("../migrations/20250301000002_create_playlists.sql"),
            include_str!("../migrations/20250301000003_create_playlist_songs.sql"),
        ];

        for migration in MIGRATIONS {
            sqlx::query(migration)
                .execute(pool)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_schema() {
        let db = Database::in_memory().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["playlist_songs", "playlists", "songs"]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.musicdb");

        let db = Database::open(&path).await.unwrap();
        sqlx::query("INSERT INTO playlists (name, created_at) VALUES ('Road trip', '2025-01-01T00:00:00Z')")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let db = Database::open(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlists")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(!path.with_extension("musicdb-journal").exists());
    }
}
