//! FlashTune Storage
//!
//! `SQLite` library database for FlashTune: downloaded songs, playlists and
//! the ordered membership of songs in playlists.
//!
//! # Architecture
//!
//! - **Single file**: the database is one file with a rollback journal, so a
//!   closed or idle database can be copied byte for byte onto a volume
//! - **Single connection**: the pool holds exactly one connection
//! - **Vertical Slicing**: `songs` and `playlists` own their queries
//!
//! Writes are not serialized here. Callers that need ordering (the USB
//! library coordinator) funnel them through their own queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use flashtune_core::NewSong;
//! use flashtune_storage::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open("/tmp/flashtune.musicdb").await?;
//!
//! let song = NewSong::new("Around the World", "Daft Punk", "https://youtu.be/x");
//! flashtune_storage::songs::insert(db.pool(), &song).await?;
//!
//! let songs = flashtune_storage::songs::get_all(db.pool()).await?;
//! # Ok(())
//! # }
//! ```

mod database;
mod error;

// Vertical slices
pub mod playlists;
pub mod songs;

pub use database::Database;
pub use error::{Result, StorageError};
