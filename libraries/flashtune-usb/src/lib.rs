//! FlashTune USB library
//!
//! The song library lives in a local `SQLite` file and is mirrored onto a
//! removable volume as `.musicdb`.
//!
//! # Architecture
//!
//! - [`WriteQueue`]: one worker applies writes in submission order
//! - [`StorageProvider`]: what the library needs from a volume;
//!   [`VolumeProvider`] implements it for mounted filesystems
//! - [`resolver`]: walks a URI from a granted root through its segments
//! - [`Library`]: attach/detach and every read and write
//!
//! # Mirror protocol
//!
//! Attaching copies the volume's database in (a volume without one starts
//! empty). Each write pushes the whole file back. Detaching pushes once
//! more. A failed push never undoes the local write; it is reported as a
//! warning alongside the result.

mod downloads;
mod error;
mod fs_provider;
mod grants;
mod library;
mod paths;
mod provider;
mod queue;
pub mod resolver;

pub use downloads::{DownloadStage, SavedSong, TrackFetcher};
pub use error::{Result, UsbError};
pub use fs_provider::{path_to_uri, uri_to_path, NoPicker, VolumePicker, VolumeProvider};
pub use grants::{GrantStore, Grants};
pub use library::{
    AttachOutcome, DetachOutcome, Library, MirrorStatus, Synced, VolumeStatus, LOCAL_DB_FILE_NAME,
};
pub use paths::{join_uri, mirror_uri, music_file_uri, GrantedRoots, RootMatch, MIRROR_FILE_NAME, MUSIC_DIR};
pub use provider::StorageProvider;
pub use queue::WriteQueue;
