//! Library coordinator
//!
//! Owns the local database, the attached-volume marker and the write queue.
//! Every mutation (including attach and detach) runs on the queue, so the
//! mirror copy of a write happens before the next write starts. Reads go
//! straight to the database and see only completed writes.

use crate::error::{Result, UsbError};
use crate::paths::{join_uri, MUSIC_DIR};
use crate::provider::StorageProvider;
use crate::queue::WriteQueue;
use flashtune_core::{
    NewSong, Playlist, PlaylistId, Song, SongId, SongPatch, StorageInfo,
};
use flashtune_storage::{playlists, songs, Database};
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// File name of the local working copy of the database
pub const LOCAL_DB_FILE_NAME: &str = "flashtune.musicdb";

/// Result of pushing the database to the volume after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum MirrorStatus {
    /// No volume attached; nothing to push
    Detached,
    Synced,
    /// The local change is kept; the volume copy is stale
    Failed(String),
}

impl MirrorStatus {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Value of a completed write together with its mirror outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub mirror: MirrorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    pub root: String,
    /// `false` when the volume had no readable database and the library
    /// started empty
    pub restored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachOutcome {
    /// Root that was attached, if any
    pub root: Option<String>,
    pub mirror: MirrorStatus,
}

impl DetachOutcome {
    pub fn warning(&self) -> Option<&str> {
        self.mirror.warning()
    }
}

/// Snapshot of an attached volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeStatus {
    pub root: String,
    pub storage: StorageInfo,
    /// Names of the files already in the music directory
    pub music_files: Vec<String>,
    pub restored: bool,
}

struct Inner {
    provider: Arc<dyn StorageProvider>,
    local_path: PathBuf,
    db: RwLock<Option<Database>>,
    volume: RwLock<Option<String>>,
    queue: WriteQueue,
}

/// The user's song library, mirrored to the attached volume
#[derive(Clone)]
pub struct Library {
    inner: Arc<Inner>,
}

impl Library {
    /// Open the local database in `cache_dir` with no volume attached
    pub async fn open(provider: Arc<dyn StorageProvider>, cache_dir: &Path) -> Result<Self> {
        let local_path = cache_dir.join(LOCAL_DB_FILE_NAME);
        let db = Database::open(&local_path).await?;

        Ok(Self {
            inner: Arc::new(Inner {
                provider,
                local_path,
                db: RwLock::new(Some(db)),
                volume: RwLock::new(None),
                queue: WriteQueue::new(),
            }),
        })
    }

    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.inner.provider
    }

    /// Path of the local working copy
    pub fn local_path(&self) -> &Path {
        &self.inner.local_path
    }

    /// Root of the attached volume
    pub async fn current_volume(&self) -> Option<String> {
        self.inner.volume.read().await.clone()
    }

    /// Wait for every write submitted so far
    pub async fn flush(&self) -> Result<()> {
        self.inner.queue.flush().await
    }

    // Reads

    pub async fn songs(&self) -> Result<Vec<Song>> {
        let db = self.inner.db.read().await;
        Ok(songs::get_all(pool(&db)?).await?)
    }

    pub async fn get_song(&self, id: SongId) -> Result<Option<Song>> {
        let db = self.inner.db.read().await;
        Ok(songs::get_by_id(pool(&db)?, id).await?)
    }

    pub async fn song_exists(&self, source_url: &str) -> Result<bool> {
        let db = self.inner.db.read().await;
        Ok(songs::exists_by_source(pool(&db)?, source_url).await?)
    }

    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let db = self.inner.db.read().await;
        Ok(playlists::get_all(pool(&db)?).await?)
    }

    pub async fn get_playlist(&self, id: PlaylistId) -> Result<Option<Playlist>> {
        let db = self.inner.db.read().await;
        Ok(playlists::get_by_id(pool(&db)?, id).await?)
    }

    pub async fn playlist_songs(&self, playlist_id: PlaylistId) -> Result<Vec<Song>> {
        let db = self.inner.db.read().await;
        Ok(playlists::get_songs(pool(&db)?, playlist_id).await?)
    }

    pub async fn playlists_for_song(&self, song_id: SongId) -> Result<Vec<PlaylistId>> {
        let db = self.inner.db.read().await;
        Ok(playlists::playlist_ids_for_song(pool(&db)?, song_id).await?)
    }

    // Writes
    //
    // Each method queues its job before returning, so calls made in a given
    // order apply in that order even when the futures are awaited later.

    /// Insert a song; `None` when its source was already in the library
    pub fn insert_song(
        &self,
        song: NewSong,
    ) -> impl Future<Output = Result<Synced<Option<SongId>>>> + Send + 'static {
        self.write("insert song", move |pool| async move {
            songs::insert(&pool, &song).await
        })
    }

    pub fn update_song(
        &self,
        id: SongId,
        patch: SongPatch,
    ) -> impl Future<Output = Result<Synced<bool>>> + Send + 'static {
        self.write("update song", move |pool| async move {
            songs::update(&pool, id, &patch).await
        })
    }

    pub fn delete_song(&self, id: SongId) -> impl Future<Output = Result<Synced<bool>>> + Send + 'static {
        self.write("delete song", move |pool| async move { songs::delete(&pool, id).await })
    }

    pub fn create_playlist(
        &self,
        name: impl Into<String>,
    ) -> impl Future<Output = Result<Synced<Playlist>>> + Send + 'static {
        let name = name.into();
        self.write("create playlist", move |pool| async move {
            playlists::create(&pool, &name).await
        })
    }

    pub fn delete_playlist(
        &self,
        id: PlaylistId,
    ) -> impl Future<Output = Result<Synced<bool>>> + Send + 'static {
        self.write("delete playlist", move |pool| async move {
            playlists::delete(&pool, id).await
        })
    }

    /// Append a song; `false` when it was already in the playlist
    pub fn add_to_playlist(
        &self,
        playlist_id: PlaylistId,
        song_id: SongId,
    ) -> impl Future<Output = Result<Synced<bool>>> + Send + 'static {
        self.write("add to playlist", move |pool| async move {
            playlists::add_song(&pool, playlist_id, song_id).await
        })
    }

    pub fn remove_from_playlist(
        &self,
        playlist_id: PlaylistId,
        song_id: SongId,
    ) -> impl Future<Output = Result<Synced<bool>>> + Send + 'static {
        self.write("remove from playlist", move |pool| async move {
            playlists::remove_song(&pool, playlist_id, song_id).await
        })
    }

    fn write<T, F, Fut>(
        &self,
        operation: &'static str,
        apply: F,
    ) -> impl Future<Output = Result<Synced<T>>> + Send + 'static
    where
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = flashtune_storage::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(async move {
            let value = {
                let db = inner.db.read().await;
                let pool = pool(&db)?.clone();
                apply(pool).await?
            };
            let mirror = inner.sync_if_attached(operation).await;
            Ok(Synced { value, mirror })
        })
    }

    // Volume lifecycle

    /// Attach a volume and load its database.
    ///
    /// A volume without a readable database starts an empty library.
    pub fn attach(
        &self,
        root: impl Into<String>,
    ) -> impl Future<Output = Result<AttachOutcome>> + Send + 'static {
        let root = root.into();
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(async move { inner.attach(root).await })
    }

    /// Push the database one last time and forget the volume.
    ///
    /// A failed final push is reported in the outcome, not as an error.
    pub fn detach(&self) -> impl Future<Output = Result<DetachOutcome>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(async move { inner.detach().await })
    }

    /// Ask for a volume, attach it and describe it
    pub async fn connect(&self) -> Result<VolumeStatus> {
        let root = self.inner.provider.request_permission().await?;
        let attached = self.attach(root.clone()).await?;

        let storage = self.inner.provider.storage_info(&root).await?;
        let music_files = match self
            .inner
            .provider
            .list_directory(&join_uri(&root, &[MUSIC_DIR]))
            .await
        {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| !entry.is_directory)
                .map(|entry| entry.name)
                .collect(),
            Err(UsbError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok(VolumeStatus {
            root,
            storage,
            music_files,
            restored: attached.restored,
        })
    }

    /// Detach the volume and close the database
    pub async fn close(self) -> Result<DetachOutcome> {
        let outcome = self.detach().await?;
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(async move {
                if let Some(db) = inner.db.write().await.take() {
                    db.close().await;
                }
                Ok(())
            })
            .await?;
        Ok(outcome)
    }
}

fn pool(db: &Option<Database>) -> Result<&SqlitePool> {
    db.as_ref()
        .map(Database::pool)
        .ok_or(UsbError::DatabaseClosed)
}

impl Inner {
    async fn sync_if_attached(&self, operation: &'static str) -> MirrorStatus {
        let volume = self.volume.read().await;
        let Some(root) = volume.as_deref() else {
            return MirrorStatus::Detached;
        };

        match self.provider.sync_database(&self.local_path, root).await {
            Ok(()) => MirrorStatus::Synced,
            Err(e) => {
                warn!(volume = %root, operation, error = %e, "Mirror sync failed, local change kept");
                MirrorStatus::Failed(e.to_string())
            }
        }
    }

    async fn attach(&self, root: String) -> Result<AttachOutcome> {
        // Both locks are held for the whole transition
        let mut volume = self.volume.write().await;
        let mut db = self.db.write().await;

        if let Some(open) = db.take() {
            open.close().await;
        }
        *volume = Some(root.clone());

        let restored = match self.provider.copy_database(&root, &self.local_path).await {
            Ok(()) => true,
            Err(e) => {
                info!(volume = %root, reason = %e, "No database on volume, starting fresh");
                self.discard_local().await?;
                false
            }
        };

        let opened = match Database::open(&self.local_path).await {
            Ok(opened) => Ok(opened),
            Err(e) if restored => {
                warn!(volume = %root, error = %e, "Volume database unreadable, starting fresh");
                self.discard_local().await?;
                Database::open(&self.local_path).await
            }
            Err(e) => Err(e),
        };

        match opened {
            Ok(opened) => {
                *db = Some(opened);
                info!(volume = %root, restored, "Volume attached");
                Ok(AttachOutcome { root, restored })
            }
            Err(e) => {
                *volume = None;
                Err(e.into())
            }
        }
    }

    async fn detach(&self) -> Result<DetachOutcome> {
        let mut volume = self.volume.write().await;
        let Some(root) = volume.clone() else {
            return Ok(DetachOutcome {
                root: None,
                mirror: MirrorStatus::Detached,
            });
        };

        let mirror = match self.provider.sync_database(&self.local_path, &root).await {
            Ok(()) => MirrorStatus::Synced,
            Err(e) => {
                warn!(volume = %root, error = %e, "Final mirror sync failed");
                MirrorStatus::Failed(e.to_string())
            }
        };
        *volume = None;

        info!(volume = %root, "Volume detached");
        Ok(DetachOutcome {
            root: Some(root),
            mirror,
        })
    }

    /// Remove the local working copy and any leftover journal
    async fn discard_local(&self) -> Result<()> {
        let mut journal = self.local_path.as_os_str().to_owned();
        journal.push("-journal");

        for path in [self.local_path.clone(), PathBuf::from(journal)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(UsbError::io("discard local database", path.display(), e)),
            }
        }
        Ok(())
    }
}
