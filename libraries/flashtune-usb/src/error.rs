use flashtune_client::ClientError;
use flashtune_storage::StorageError;
use thiserror::Error;

/// Errors raised by the volume layer and the library coordinator
#[derive(Error, Debug)]
pub enum UsbError {
    #[error("No volume attached")]
    NotAttached,

    #[error("Library database is not open")]
    DatabaseClosed,

    #[error("Volume permission request was cancelled")]
    PermissionCancelled,

    #[error("Volume permission request is already in progress")]
    PermissionPending,

    #[error("No permission granted for {uri}")]
    PermissionDenied { uri: String },

    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Does not exist: {uri}")]
    NotFound { uri: String },

    #[error("Not a directory: {uri}")]
    NotADirectory { uri: String },

    #[error("Target is a directory: {uri}")]
    IsDirectory { uri: String },

    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Song already exists on drive: {source_url}")]
    AlreadyExists { source_url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Download failed: {0}")]
    Download(#[from] ClientError),

    #[error("Grant store is corrupt: {0}")]
    Grants(#[from] serde_json::Error),

    #[error("Write queue has stopped")]
    QueueClosed,

    #[error("Write task panicked: {0}")]
    TaskPanicked(String),
}

impl UsbError {
    /// Wrap an I/O error with the operation and path it failed on
    pub fn io(operation: &'static str, path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_string(),
            source,
        }
    }

    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }
}

pub type Result<T> = std::result::Result<T, UsbError>;
