//! Command implementations

use crate::preview::{PreviewPlayer, PreviewSource};
use crate::session::{report_mirror, Session};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flashtune_client::BackendClient;
use flashtune_core::{PlaylistId, SearchResult, Song, SongId, SongPatch};
use flashtune_usb::{music_file_uri, uri_to_path, DownloadStage, TrackFetcher, UsbError};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

pub async fn search(client: &BackendClient, query: &str) -> Result<()> {
    let results = client.search(query).await?;
    if results.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{:>2}. {} - {} [{}]",
            i + 1,
            result.artist,
            result.title,
            format_duration(result.duration_ms)
        );
        println!("    {}", result.source_url);
    }
    Ok(())
}

/// Track for `target`: a locator is looked up directly, anything else is
/// searched and the `pick`-th result (1-based) is used
async fn resolve_track(client: &BackendClient, target: &str, pick: usize) -> Result<SearchResult> {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        let info = client.playlist_info(target).await?;
        let mut track = info.tracks.into_iter().next().unwrap_or_else(|| SearchResult {
            title: target.to_string(),
            artist: String::new(),
            duration_ms: 0,
            thumbnail_url: String::new(),
            source_url: target.to_string(),
        });
        if track.source_url.is_empty() {
            track.source_url = target.to_string();
        }
        return Ok(track);
    }

    let results = client.search(target).await?;
    let index = pick.max(1) - 1;
    results
        .into_iter()
        .nth(index)
        .with_context(|| format!("No result #{} for {:?}", index + 1, target))
}

/// Backend fetcher that drives a progress bar
struct ProgressFetcher<'a> {
    client: &'a BackendClient,
    bar: ProgressBar,
}

#[async_trait]
impl TrackFetcher for ProgressFetcher<'_> {
    async fn fetch(&self, source_url: &str, dest: &Path) -> flashtune_usb::Result<u64> {
        let bar = self.bar.clone();
        let bytes = self
            .client
            .download_to(source_url, dest, move |progress| {
                bar.set_message(format!(
                    "downloading {} KiB",
                    progress.bytes_received / 1024
                ));
            })
            .await?;
        Ok(bytes)
    }
}

fn stage_label(stage: DownloadStage) -> &'static str {
    match stage {
        DownloadStage::Downloading => "downloading",
        DownloadStage::Downloaded => "downloaded",
        DownloadStage::Copying => "copying to volume",
        DownloadStage::Recording => "updating library",
        DownloadStage::Done => "done",
    }
}

pub async fn download(session: &Session, target: &str, pick: usize) -> Result<()> {
    session.require_volume()?;
    let track = resolve_track(&session.client, target, pick).await?;
    println!("{} - {}", track.artist, track.title);

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {percent:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));

    let fetcher = ProgressFetcher {
        client: &session.client,
        bar: bar.clone(),
    };
    let stage_bar = bar.clone();
    let saved = session
        .library
        .download_and_save(&fetcher, &track, &session.config.temp_dir(), move |stage| {
            stage_bar.set_position((stage.progress() * 100.0).round() as u64);
            stage_bar.set_message(stage_label(stage));
        })
        .await;
    bar.finish_and_clear();

    match saved {
        Ok(saved) => {
            match saved.song_id {
                Some(id) => println!("Saved #{}: {}", id, saved.filename),
                None => println!("Saved {} (already recorded)", saved.filename),
            }
            report_mirror(&saved.mirror);
            Ok(())
        }
        Err(UsbError::AlreadyExists { source_url }) => {
            println!("Already in the library: {}", source_url);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn songs(session: &Session) -> Result<()> {
    let songs = session.library.songs().await?;
    if songs.is_empty() {
        println!("Library is empty");
        return Ok(());
    }
    print_songs(&songs);
    Ok(())
}

pub async fn edit(session: &Session, id: SongId, patch: SongPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("Nothing to change; pass --title, --artist or --album");
    }

    let synced = session.library.update_song(id, patch).await?;
    if !synced.value {
        bail!("No song #{}", id);
    }
    println!("Updated song #{}", id);
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn remove(session: &Session, id: SongId) -> Result<()> {
    let synced = if session.volume.is_some() {
        session.library.delete_song_with_file(id).await?
    } else {
        session.library.delete_song(id).await?
    };

    if !synced.value {
        bail!("No song #{}", id);
    }
    println!("Deleted song #{}", id);
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn playlists(session: &Session) -> Result<()> {
    let playlists = session.library.playlists().await?;
    if playlists.is_empty() {
        println!("No playlists");
        return Ok(());
    }

    for playlist in playlists {
        let count = session.library.playlist_songs(playlist.id).await?.len();
        println!("{:>4}  {} ({} songs)", playlist.id, playlist.name, count);
    }
    Ok(())
}

pub async fn create_playlist(session: &Session, name: &str) -> Result<()> {
    let synced = session.library.create_playlist(name).await?;
    println!("Created playlist #{}: {}", synced.value.id, synced.value.name);
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn delete_playlist(session: &Session, id: PlaylistId) -> Result<()> {
    let synced = session.library.delete_playlist(id).await?;
    if !synced.value {
        bail!("No playlist #{}", id);
    }
    println!("Deleted playlist #{}", id);
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn add_to_playlist(session: &Session, playlist: PlaylistId, song: SongId) -> Result<()> {
    let synced = session.library.add_to_playlist(playlist, song).await?;
    if synced.value {
        println!("Added song #{} to playlist #{}", song, playlist);
    } else {
        println!("Song #{} is already in playlist #{}", song, playlist);
    }
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn remove_from_playlist(
    session: &Session,
    playlist: PlaylistId,
    song: SongId,
) -> Result<()> {
    let synced = session.library.remove_from_playlist(playlist, song).await?;
    if synced.value {
        println!("Removed song #{} from playlist #{}", song, playlist);
    } else {
        println!("Song #{} was not in playlist #{}", song, playlist);
    }
    report_mirror(&synced.mirror);
    Ok(())
}

pub async fn show_playlist(session: &Session, id: PlaylistId) -> Result<()> {
    let playlist = session
        .library
        .get_playlist(id)
        .await?
        .with_context(|| format!("No playlist #{}", id))?;
    let songs = session.library.playlist_songs(id).await?;

    println!("{} ({} songs)", playlist.name, songs.len());
    print_songs(&songs);
    Ok(())
}

pub async fn status(session: &Session) -> Result<()> {
    match session.client.health().await {
        Ok(health) => println!(
            "Backend:  {} ({}, {})",
            session.client.url(),
            health.status,
            health.version.as_deref().unwrap_or("unknown version")
        ),
        Err(e) => println!("Backend:  {} unreachable ({})", session.client.url(), e),
    }

    match &session.volume {
        Some(volume) => {
            let gib = |bytes: u64| bytes as f64 / (1024.0 * 1024.0 * 1024.0);
            println!("Volume:   {}", volume.root);
            println!(
                "Storage:  {:.1} GiB used of {:.1} GiB ({:.1} GiB free)",
                gib(volume.storage.used),
                gib(volume.storage.total),
                gib(volume.storage.free)
            );
            println!("Files:    {} in Music/", volume.music_files.len());
        }
        None => println!("Volume:   not attached"),
    }

    println!("Songs:    {}", session.library.songs().await?.len());
    println!("Local db: {}", session.library.local_path().display());
    Ok(())
}

pub async fn forget(session: &Session) -> Result<()> {
    session.provider.clear_permission().await?;
    println!("Forgot all granted volumes");
    Ok(())
}

/// Play a library song from the volume, or stream a locator or search hit
pub async fn preview(
    session: &mut Session,
    player: Option<&Arc<dyn PreviewPlayer>>,
    target: &str,
) -> Result<()> {
    let source = match target.trim().parse::<SongId>() {
        Ok(id) => {
            let root = session
                .connect()
                .await?
                .map(|volume| volume.root.clone())
                .context("No USB volume attached; run `flashtune attach <path>` first")?;
            let song = session
                .library
                .get_song(id)
                .await?
                .with_context(|| format!("No song #{}", id))?;
            let uri = music_file_uri(&root, &song.filename);
            PreviewSource::File(uri_to_path(&uri)?)
        }
        Err(_) => {
            let track = resolve_track(&session.client, target, 1).await?;
            println!("{} - {}", track.artist, track.title);
            PreviewSource::Stream {
                url: session.client.download_url(&track.source_url),
                api_key: session.config.api_key.clone(),
            }
        }
    };

    let Some(player) = player else {
        println!("No preview player found (install ffplay or mpv).");
        match &source {
            PreviewSource::Stream { url, .. } => println!("Stream URL: {}", url),
            PreviewSource::File(path) => println!("File: {}", path.display()),
        }
        return Ok(());
    };

    println!("Playing with {} (quit the player to stop)", player.name());
    player.play(&source).await
}

fn print_songs(songs: &[Song]) {
    for song in songs {
        let album = if song.album.is_empty() {
            String::new()
        } else {
            format!(" ({})", song.album)
        };
        println!(
            "{:>4}  {} - {}{} [{}]",
            song.id,
            song.artist,
            song.title,
            album,
            format_duration(song.duration_ms)
        );
    }
}

fn format_duration(duration_ms: i64) -> String {
    let total = duration_ms.max(0) / 1000;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(61_900), "1:01");
        assert_eq!(format_duration(-5), "0:00");
        assert_eq!(format_duration(3_600_000), "60:00");
    }

    #[test]
    fn test_stage_labels_cover_progress() {
        let stages = [
            DownloadStage::Downloading,
            DownloadStage::Downloaded,
            DownloadStage::Copying,
            DownloadStage::Recording,
            DownloadStage::Done,
        ];
        for stage in stages {
            assert!(!stage_label(stage).is_empty());
        }
    }
}
