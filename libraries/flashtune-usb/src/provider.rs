//! Storage-provider capability
//!
//! Everything the library needs from a removable volume. URIs are opaque
//! strings understood by the provider; the database mirror lives at
//! `{root}/.musicdb`.

use crate::error::Result;
use crate::paths::mirror_uri;
use async_trait::async_trait;
use flashtune_core::{FileEntry, StorageInfo};
use std::path::Path;

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Return the root URI of a volume the user has granted access to,
    /// prompting when no earlier grant is still usable
    async fn request_permission(&self) -> Result<String>;

    /// List the direct children of a directory
    async fn list_directory(&self, uri: &str) -> Result<Vec<FileEntry>>;

    /// Copy a local file to `dest_uri`, replacing its content
    async fn write_file(&self, dest_uri: &str, local_src: &Path) -> Result<()>;

    /// Copy the document at `src_uri` to a local file
    async fn read_file(&self, src_uri: &str, local_dest: &Path) -> Result<()>;

    async fn delete_file(&self, uri: &str) -> Result<()>;

    /// Space on the volume holding `uri`
    async fn storage_info(&self, uri: &str) -> Result<StorageInfo>;

    /// Copy the volume's database mirror to a local path
    async fn copy_database(&self, root: &str, local_dest: &Path) -> Result<()> {
        self.read_file(&mirror_uri(root), local_dest).await
    }

    /// Overwrite the volume's database mirror with a local file
    async fn sync_database(&self, local_src: &Path, root: &str) -> Result<()> {
        self.write_file(&mirror_uri(root), local_src).await
    }
}
