//! Shared fixtures: temp volumes, providers with injectable failures and
//! a canned track fetcher.

#![allow(dead_code)]

use async_trait::async_trait;
use flashtune_core::{FileEntry, SearchResult, StorageInfo};
use flashtune_usb::{
    Library, NoPicker, StorageProvider, TrackFetcher, UsbError, VolumePicker, VolumeProvider,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A fake removable volume plus the app's data and cache directories
pub struct TestEnv {
    pub volume: TempDir,
    pub data: TempDir,
    pub cache: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            volume: tempfile::tempdir().expect("Failed to create volume dir"),
            data: tempfile::tempdir().expect("Failed to create data dir"),
            cache: tempfile::tempdir().expect("Failed to create cache dir"),
        }
    }

    pub fn volume_path(&self) -> &Path {
        self.volume.path()
    }

    /// Provider that never prompts
    pub fn provider(&self) -> Arc<VolumeProvider> {
        Arc::new(VolumeProvider::new(self.data.path(), Arc::new(NoPicker)))
    }

    /// Provider whose picker offers this environment's volume
    pub fn picking_provider(&self) -> Arc<VolumeProvider> {
        Arc::new(VolumeProvider::new(
            self.data.path(),
            Arc::new(FixedPicker(Some(self.volume.path().to_path_buf()))),
        ))
    }

    /// Grant the volume and return its root URI
    pub async fn grant(&self, provider: &VolumeProvider) -> String {
        provider
            .grant(self.volume.path())
            .await
            .expect("Failed to grant volume")
    }

    /// Library over `provider`, not attached
    pub async fn library(&self, provider: Arc<dyn StorageProvider>) -> Library {
        Library::open(provider, self.cache.path())
            .await
            .expect("Failed to open library")
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.volume.path().join(".musicdb")
    }

    pub fn music_path(&self, filename: &str) -> PathBuf {
        self.volume.path().join("Music").join(filename)
    }
}

/// Picker returning a fixed answer
pub struct FixedPicker(pub Option<PathBuf>);

#[async_trait]
impl VolumePicker for FixedPicker {
    async fn pick_volume(&self) -> flashtune_usb::Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Wraps a provider; database pushes fail while `fail_sync` is set
pub struct FlakyProvider {
    pub inner: Arc<VolumeProvider>,
    pub fail_sync: AtomicBool,
    pub syncs: AtomicUsize,
}

impl FlakyProvider {
    pub fn new(inner: Arc<VolumeProvider>) -> Self {
        Self {
            inner,
            fail_sync: AtomicBool::new(false),
            syncs: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_sync.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageProvider for FlakyProvider {
    async fn request_permission(&self) -> flashtune_usb::Result<String> {
        self.inner.request_permission().await
    }

    async fn list_directory(&self, uri: &str) -> flashtune_usb::Result<Vec<FileEntry>> {
        self.inner.list_directory(uri).await
    }

    async fn write_file(&self, dest_uri: &str, local_src: &Path) -> flashtune_usb::Result<()> {
        self.inner.write_file(dest_uri, local_src).await
    }

    async fn read_file(&self, src_uri: &str, local_dest: &Path) -> flashtune_usb::Result<()> {
        self.inner.read_file(src_uri, local_dest).await
    }

    async fn delete_file(&self, uri: &str) -> flashtune_usb::Result<()> {
        self.inner.delete_file(uri).await
    }

    async fn storage_info(&self, uri: &str) -> flashtune_usb::Result<StorageInfo> {
        self.inner.storage_info(uri).await
    }

    async fn sync_database(&self, local_src: &Path, root: &str) -> flashtune_usb::Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(UsbError::io(
                "copy to volume",
                root,
                std::io::Error::new(std::io::ErrorKind::Other, "device unplugged"),
            ));
        }
        self.inner.sync_database(local_src, root).await
    }
}

/// Fetcher that writes fixed bytes, or fails when `fail` is set
pub struct CannedFetcher {
    pub bytes: Vec<u8>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CannedFetcher {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(b"")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackFetcher for CannedFetcher {
    async fn fetch(&self, _source_url: &str, dest: &Path) -> flashtune_usb::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Partial data lands before the failure, like a dropped stream
        tokio::fs::write(dest, &self.bytes)
            .await
            .map_err(|e| UsbError::io("write temp", dest.display(), e))?;
        if self.fail {
            return Err(UsbError::Download(flashtune_client::ClientError::Server {
                status: 422,
                message: "Video unavailable".to_string(),
            }));
        }
        Ok(self.bytes.len() as u64)
    }
}

pub fn search_result(title: &str, source_url: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        artist: "Daft Punk".to_string(),
        duration_ms: 320_000,
        thumbnail_url: String::new(),
        source_url: source_url.to_string(),
    }
}
