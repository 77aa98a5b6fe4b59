/// Removable volume types
use serde::{Deserialize, Serialize};

/// Entry returned when listing a directory on the volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
}

/// Capacity of the volume in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub used: u64,
    pub free: u64,
    pub total: u64,
}

impl StorageInfo {
    /// Fraction of the volume in use, 0.0 when the size is unknown
    pub fn usage_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64
        }
    }
}
