/// FlashTune CLI - search, download to a USB volume, manage the library
mod commands;
mod config;
mod picker;
mod preview;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::CliConfig;
use flashtune_core::{PlaylistId, SongId, SongPatch};
use flashtune_usb::{NoPicker, VolumePicker};
use picker::StdinPicker;
use session::Session;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flashtune")]
#[command(about = "Download music onto a USB drive and manage its library", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the backend for tracks
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Download a track onto the attached volume
    Download {
        /// Track URL, or a search query
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
        /// Which search result to take (1-based)
        #[arg(short, long, default_value_t = 1)]
        pick: usize,
    },
    /// List songs, newest first
    Songs,
    /// Edit a song's metadata
    Edit {
        id: SongId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
    },
    /// Delete a song and its audio file
    Rm { id: SongId },
    /// List playlists
    Playlists,
    /// Manage a playlist
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
    /// Show backend and volume status
    Status,
    /// Grant access to a volume; prompts when no path is given
    Attach { path: Option<PathBuf> },
    /// Forget every granted volume
    Forget,
    /// Listen to a song (by id), a URL or the first search hit
    Preview {
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PlaylistAction {
    /// Create a playlist
    Create {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Delete a playlist
    Delete { id: PlaylistId },
    /// Append a song
    Add { playlist: PlaylistId, song: SongId },
    /// Remove a song
    Remove { playlist: PlaylistId, song: SongId },
    /// List a playlist's songs in order
    Show { id: PlaylistId },
}

impl Commands {
    /// Commands that read or write the library attach the volume first
    fn uses_volume(&self) -> bool {
        !matches!(
            self,
            Commands::Search { .. } | Commands::Forget | Commands::Preview { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashtune=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    let player = preview::detect();

    let picker: Arc<dyn VolumePicker> = match &cli.command {
        Commands::Attach { path: None } => Arc::new(StdinPicker),
        _ => Arc::new(NoPicker),
    };

    let mut session = Session::open(config, picker).await?;

    if let Commands::Attach { path: Some(path) } = &cli.command {
        session.provider.grant(path).await?;
    }
    if cli.command.uses_volume() {
        session.connect().await?;
    }

    let result = run(&mut session, player.as_ref(), cli.command).await;
    let closed = session.close().await;

    result?;
    closed
}

async fn run(
    session: &mut Session,
    player: Option<&Arc<dyn preview::PreviewPlayer>>,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Search { query } => commands::search(&session.client, &query.join(" ")).await,
        Commands::Download { target, pick } => {
            commands::download(session, &target.join(" "), pick).await
        }
        Commands::Songs => commands::songs(session).await,
        Commands::Edit {
            id,
            title,
            artist,
            album,
        } => {
            let patch = SongPatch {
                title,
                artist,
                album,
                ..Default::default()
            };
            commands::edit(session, id, patch).await
        }
        Commands::Rm { id } => commands::remove(session, id).await,
        Commands::Playlists => commands::playlists(session).await,
        Commands::Playlist { action } => match action {
            PlaylistAction::Create { name } => {
                commands::create_playlist(session, &name.join(" ")).await
            }
            PlaylistAction::Delete { id } => commands::delete_playlist(session, id).await,
            PlaylistAction::Add { playlist, song } => {
                commands::add_to_playlist(session, playlist, song).await
            }
            PlaylistAction::Remove { playlist, song } => {
                commands::remove_from_playlist(session, playlist, song).await
            }
            PlaylistAction::Show { id } => commands::show_playlist(session, id).await,
        },
        Commands::Status => commands::status(session).await,
        Commands::Attach { .. } => {
            let volume = session.require_volume()?;
            println!("Attached {}", volume.root);
            Ok(())
        }
        Commands::Forget => commands::forget(session).await,
        Commands::Preview { target } => {
            commands::preview(session, player, &target.join(" ")).await
        }
    }
}
