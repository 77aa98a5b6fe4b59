//! FlashTune Core
//!
//! Platform-agnostic domain types shared by the backend, the library
//! database, the USB mirror and the command-line client.
//!
//! # Example
//!
//! ```rust
//! use flashtune_core::{NewSong, SongPatch};
//!
//! let song = NewSong::new("Around the World", "Daft Punk", "https://youtu.be/K0HSD_i2DvA");
//! assert_eq!(song.filename, "Daft Punk - Around the World.mp3");
//!
//! let patch = SongPatch::default();
//! assert!(patch.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{
    sanitize_filename, FileEntry, Membership, NewSong, Playlist, PlaylistId, PlaylistInfo, SearchResult, Song,
    SongId, SongPatch, StorageInfo,
};
