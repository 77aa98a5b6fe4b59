//! Optional audio preview through an external player
//!
//! Looked up once at startup; without a player on `PATH` the `preview`
//! command prints the stream URL instead.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;

/// What to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewSource {
    /// Backend download stream
    Stream { url: String, api_key: String },
    /// Audio file on the volume
    File(PathBuf),
}

#[async_trait]
pub trait PreviewPlayer: Send + Sync {
    fn name(&self) -> &str;

    /// Play until the track ends or the user quits the player
    async fn play(&self, source: &PreviewSource) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerKind {
    Ffplay,
    Mpv,
}

impl PlayerKind {
    const ALL: [PlayerKind; 2] = [PlayerKind::Ffplay, PlayerKind::Mpv];

    fn program(self) -> &'static str {
        match self {
            PlayerKind::Ffplay => "ffplay",
            PlayerKind::Mpv => "mpv",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalPlayer {
    kind: PlayerKind,
    program: PathBuf,
}

impl ExternalPlayer {
    fn args(&self, source: &PreviewSource) -> Vec<String> {
        let mut args: Vec<String> = match self.kind {
            PlayerKind::Ffplay => vec!["-nodisp", "-autoexit", "-loglevel", "error"],
            PlayerKind::Mpv => vec!["--no-video", "--really-quiet"],
        }
        .into_iter()
        .map(String::from)
        .collect();

        match source {
            PreviewSource::Stream { url, api_key } => {
                if !api_key.is_empty() {
                    match self.kind {
                        PlayerKind::Ffplay => {
                            args.push("-headers".to_string());
                            args.push(format!("X-API-Key: {}\r\n", api_key));
                        }
                        PlayerKind::Mpv => {
                            args.push(format!("--http-header-fields=X-API-Key: {}", api_key));
                        }
                    }
                }
                args.push(url.clone());
            }
            PreviewSource::File(path) => args.push(path.display().to_string()),
        }

        args
    }
}

#[async_trait]
impl PreviewPlayer for ExternalPlayer {
    fn name(&self) -> &str {
        self.kind.program()
    }

    async fn play(&self, source: &PreviewSource) -> Result<()> {
        tracing::debug!(player = self.name(), ?source, "Starting preview");

        let status = Command::new(&self.program)
            .args(self.args(source))
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to start {}", self.name()))?;

        if !status.success() {
            bail!("{} exited with {}", self.name(), status);
        }
        Ok(())
    }
}

/// First known player found on `PATH`
pub fn detect() -> Option<Arc<dyn PreviewPlayer>> {
    std::env::var_os("PATH").and_then(|path| detect_in(&path))
}

fn detect_in(path: &OsStr) -> Option<Arc<dyn PreviewPlayer>> {
    PlayerKind::ALL.iter().find_map(|kind| {
        std::env::split_paths(path)
            .map(|dir| dir.join(kind.program()))
            .find(|candidate| candidate.is_file())
            .map(|program| {
                Arc::new(ExternalPlayer {
                    kind: *kind,
                    program,
                }) as Arc<dyn PreviewPlayer>
            })
    })
}
