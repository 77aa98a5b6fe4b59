mod playlist;
mod search;
mod song;
mod volume;

pub use playlist::{Membership, Playlist, PlaylistId};
pub use search::{PlaylistInfo, SearchResult};
pub use song::{sanitize_filename, NewSong, Song, SongId, SongPatch};
pub use volume::{FileEntry, StorageInfo};
