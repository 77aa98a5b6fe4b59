//! Persisted volume grants
//!
//! Stored as JSON in the data directory:
//! `{"active": "file:///media/usb", "granted": ["file:///media/usb"]}`

use crate::error::{Result, UsbError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const GRANTS_FILE_NAME: &str = "volume-grants.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    /// Root used by default
    #[serde(default)]
    pub active: Option<String>,

    /// Every root granted so far, active included
    #[serde(default)]
    pub granted: Vec<String>,
}

impl Grants {
    /// Make `root` the active grant, remembering it
    pub fn activate(&mut self, root: &str) {
        if !self.granted.iter().any(|g| g == root) {
            self.granted.push(root.to_string());
        }
        self.active = Some(root.to_string());
    }
}

/// JSON file holding the grants
#[derive(Debug, Clone)]
pub struct GrantStore {
    path: PathBuf,
}

impl GrantStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(GRANTS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the grants; a missing file means nothing was granted
    pub async fn load(&self) -> Result<Grants> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Grants::default()),
            Err(e) => Err(UsbError::io("read grants", self.path.display(), e)),
        }
    }

    pub async fn save(&self, grants: &Grants) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UsbError::io("create data directory", parent.display(), e))?;
        }
        let json = serde_json::to_vec_pretty(grants)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| UsbError::io("write grants", self.path.display(), e))
    }

    /// Forget every grant
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UsbError::io("remove grants", self.path.display(), e)),
        }
    }
}
