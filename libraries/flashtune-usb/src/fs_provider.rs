//! Storage provider for volumes mounted into the local filesystem
//!
//! Volume roots are `file://` URIs of mount points (or any directory the
//! user picks). Grants are persisted in the data directory, so a volume
//! that was attached once is found again without prompting.

use crate::error::{Result, UsbError};
use crate::grants::GrantStore;
use crate::paths::{join_uri, GrantedRoots};
use crate::provider::StorageProvider;
use crate::resolver::{resolve_existing, resolve_for_write, resolve_granted, DocumentTree};
use async_trait::async_trait;
use flashtune_core::{FileEntry, StorageInfo};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Asks the user which volume to use
#[async_trait]
pub trait VolumePicker: Send + Sync {
    /// Directory picked by the user, `None` if they cancelled
    async fn pick_volume(&self) -> Result<Option<PathBuf>>;
}

/// Picker that never offers a volume; only earlier grants are usable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPicker;

#[async_trait]
impl VolumePicker for NoPicker {
    async fn pick_volume(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Convert a `file://` URI to a local path
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let url = Url::parse(uri).map_err(|e| UsbError::invalid_uri(uri, e.to_string()))?;
    if url.scheme() != "file" {
        return Err(UsbError::invalid_uri(uri, "only file:// URIs are supported"));
    }
    url.to_file_path()
        .map_err(|()| UsbError::invalid_uri(uri, "not a local path"))
}

/// Convert an absolute local path to a `file://` URI without a trailing slash
pub fn path_to_uri(path: &Path) -> Result<String> {
    let url = Url::from_file_path(path)
        .map_err(|()| UsbError::invalid_uri(path.display().to_string(), "path must be absolute"))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[derive(Debug, Clone)]
struct FsDoc {
    path: PathBuf,
    is_dir: bool,
}

#[derive(Debug, Clone, Copy)]
struct FsTree;

async fn stat(path: &Path) -> Result<Option<FsDoc>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(FsDoc {
            path: path.to_path_buf(),
            is_dir: meta.is_dir(),
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(UsbError::io("stat", path.display(), e)),
    }
}

/// A decoded segment must name exactly one child
fn check_name(parent: &Path, name: &str) -> Result<()> {
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(UsbError::invalid_uri(
            parent.join(name).display().to_string(),
            format!("invalid file name {:?}", name),
        ));
    }
    Ok(())
}

#[async_trait]
impl DocumentTree for FsTree {
    type Doc = FsDoc;

    async fn open_root(&self, root_uri: &str) -> Result<Option<FsDoc>> {
        let path = uri_to_path(root_uri)?;
        Ok(stat(&path).await?.filter(|doc| doc.is_dir))
    }

    async fn open_direct(&self, uri: &str) -> Result<Option<FsDoc>> {
        stat(&uri_to_path(uri)?).await
    }

    async fn find_child(&self, parent: &FsDoc, name: &str) -> Result<Option<FsDoc>> {
        check_name(&parent.path, name)?;
        stat(&parent.path.join(name)).await
    }

    async fn create_directory(&self, parent: &FsDoc, name: &str) -> Result<FsDoc> {
        check_name(&parent.path, name)?;
        let path = parent.path.join(name);
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| UsbError::io("create directory", path.display(), e))?;
        Ok(FsDoc { path, is_dir: true })
    }

    async fn create_file(&self, parent: &FsDoc, name: &str) -> Result<FsDoc> {
        check_name(&parent.path, name)?;
        let path = parent.path.join(name);
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| UsbError::io("create file", path.display(), e))?;
        Ok(FsDoc {
            path,
            is_dir: false,
        })
    }

    fn is_directory(&self, doc: &FsDoc) -> bool {
        doc.is_dir
    }
}

/// Filesystem-backed storage provider
pub struct VolumeProvider {
    tree: FsTree,
    grants: GrantStore,
    picker: Arc<dyn VolumePicker>,
    requesting: Mutex<()>,
}

impl VolumeProvider {
    pub fn new(data_dir: &Path, picker: Arc<dyn VolumePicker>) -> Self {
        Self {
            tree: FsTree,
            grants: GrantStore::new(data_dir),
            picker,
            requesting: Mutex::new(()),
        }
    }

    async fn reachable(&self, root: &str) -> bool {
        matches!(self.tree.open_root(root).await, Ok(Some(_)))
    }

    /// Active root plus the earlier grants that are still reachable
    async fn roots(&self) -> Result<GrantedRoots> {
        let grants = self.grants.load().await?;
        let mut others = Vec::new();
        for root in &grants.granted {
            if grants.active.as_deref() != Some(root.as_str()) && self.reachable(root).await {
                others.push(root.clone());
            }
        }
        Ok(GrantedRoots::new(grants.active.as_deref(), others))
    }

    /// Grant access to a directory and make it the active volume
    pub async fn grant(&self, path: &Path) -> Result<String> {
        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| UsbError::io("open volume", path.display(), e))?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| UsbError::io("open volume", path.display(), e))?;
        if !meta.is_dir() {
            return Err(UsbError::NotADirectory {
                uri: path.display().to_string(),
            });
        }

        let root = path_to_uri(&path)?;
        let mut grants = self.grants.load().await?;
        grants.activate(&root);
        self.grants.save(&grants).await?;

        info!(volume = %root, "Volume access granted");
        Ok(root)
    }

    /// Forget every grant; the next request prompts again
    pub async fn clear_permission(&self) -> Result<()> {
        self.grants.clear().await?;
        info!("Volume grants cleared");
        Ok(())
    }

    /// Rename a file in place, returning its new URI
    pub async fn rename_file(&self, uri: &str, new_name: &str) -> Result<String> {
        let roots = self.roots().await?;
        let matched = roots
            .match_root(uri)
            .ok_or_else(|| UsbError::PermissionDenied {
                uri: uri.to_string(),
            })?;
        let doc = resolve_granted(&self.tree, &roots, uri).await?;
        if doc.is_dir {
            return Err(UsbError::IsDirectory {
                uri: uri.to_string(),
            });
        }

        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(UsbError::invalid_uri(uri, "new file name is required"));
        }
        let parent = doc
            .path
            .parent()
            .ok_or_else(|| UsbError::invalid_uri(uri, "file has no parent directory"))?;
        check_name(parent, new_name)?;

        let target = parent.join(new_name);
        if stat(&target).await?.is_some() {
            return Err(UsbError::io(
                "rename",
                target.display(),
                std::io::Error::new(ErrorKind::AlreadyExists, "target already exists"),
            ));
        }
        tokio::fs::rename(&doc.path, &target)
            .await
            .map_err(|e| UsbError::io("rename", doc.path.display(), e))?;

        let mut segments = matched.segments;
        segments.pop();
        segments.push(new_name.to_string());
        Ok(join_uri(matched.root, &segments))
    }
}

#[async_trait]
impl StorageProvider for VolumeProvider {
    async fn request_permission(&self) -> Result<String> {
        let _guard = self
            .requesting
            .try_lock()
            .map_err(|_| UsbError::PermissionPending)?;

        let mut grants = self.grants.load().await?;
        if let Some(active) = grants.active.clone() {
            if self.reachable(&active).await {
                return Ok(active);
            }
            debug!(volume = %active, "Active volume not reachable");
        }

        for root in grants.granted.clone() {
            if self.reachable(&root).await {
                grants.activate(&root);
                self.grants.save(&grants).await?;
                info!(volume = %root, "Using previously granted volume");
                return Ok(root);
            }
        }

        let picked = self
            .picker
            .pick_volume()
            .await?
            .ok_or(UsbError::PermissionCancelled)?;
        self.grant(&picked).await
    }

    async fn list_directory(&self, uri: &str) -> Result<Vec<FileEntry>> {
        let roots = self.roots().await?;
        let dir = resolve_existing(&self.tree, &roots, uri).await?;
        if !dir.is_dir {
            return Err(UsbError::NotADirectory {
                uri: uri.to_string(),
            });
        }

        let mut reader = tokio::fs::read_dir(&dir.path)
            .await
            .map_err(|e| UsbError::io("list directory", dir.path.display(), e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| UsbError::io("list directory", dir.path.display(), e))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| UsbError::io("stat", entry.path().display(), e))?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn write_file(&self, dest_uri: &str, local_src: &Path) -> Result<()> {
        let meta = tokio::fs::metadata(local_src)
            .await
            .map_err(|e| UsbError::io("read source", local_src.display(), e))?;
        if !meta.is_file() {
            return Err(UsbError::IsDirectory {
                uri: local_src.display().to_string(),
            });
        }

        let roots = self.roots().await?;
        let dest = resolve_for_write(&self.tree, &roots, dest_uri).await?;

        let bytes = tokio::fs::copy(local_src, &dest.path)
            .await
            .map_err(|e| UsbError::io("copy to volume", dest_uri, e))?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&dest.path)
            .await
            .map_err(|e| UsbError::io("open for sync", dest_uri, e))?;
        file.sync_all()
            .await
            .map_err(|e| UsbError::io("sync to volume", dest_uri, e))?;

        debug!(uri = %dest_uri, bytes, "Wrote file to volume");
        Ok(())
    }

    async fn read_file(&self, src_uri: &str, local_dest: &Path) -> Result<()> {
        let roots = self.roots().await?;
        let src = resolve_existing(&self.tree, &roots, src_uri).await?;
        if src.is_dir {
            return Err(UsbError::IsDirectory {
                uri: src_uri.to_string(),
            });
        }

        if let Some(parent) = local_dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UsbError::io("create directory", parent.display(), e))?;
        }

        // Land the copy next to the destination, then swap it in
        let mut partial = local_dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        tokio::fs::copy(&src.path, &partial)
            .await
            .map_err(|e| UsbError::io("copy from volume", src_uri, e))?;
        tokio::fs::rename(&partial, local_dest)
            .await
            .map_err(|e| UsbError::io("replace local file", local_dest.display(), e))?;

        debug!(uri = %src_uri, dest = %local_dest.display(), "Read file from volume");
        Ok(())
    }

    async fn delete_file(&self, uri: &str) -> Result<()> {
        let roots = self.roots().await?;
        let doc = resolve_granted(&self.tree, &roots, uri).await?;
        let result = if doc.is_dir {
            tokio::fs::remove_dir_all(&doc.path).await
        } else {
            tokio::fs::remove_file(&doc.path).await
        };
        result.map_err(|e| UsbError::io("delete", uri, e))
    }

    async fn storage_info(&self, uri: &str) -> Result<StorageInfo> {
        let roots = self.roots().await?;
        let path = match roots.match_root(uri) {
            Some(matched) => {
                self.tree
                    .open_root(matched.root)
                    .await?
                    .ok_or_else(|| UsbError::not_found(matched.root))?
                    .path
            }
            None => {
                stat(&uri_to_path(uri)?)
                    .await?
                    .ok_or_else(|| UsbError::not_found(uri))?
                    .path
            }
        };

        let display = path.display().to_string();
        let (total, free) = tokio::task::spawn_blocking(move || {
            Ok::<_, std::io::Error>((fs2::total_space(&path)?, fs2::available_space(&path)?))
        })
        .await
        .map_err(|e| UsbError::TaskPanicked(e.to_string()))?
        .map_err(|e| UsbError::io("query volume space", &display, e))?;

        Ok(StorageInfo {
            used: total.saturating_sub(free),
            free,
            total,
        })
    }
}
