//! Two-stage download pipeline
//!
//! The extractor fetches the best audio track of a remote locator and writes
//! it to stdout. The transcoder reads that stream on stdin and writes MP3 to
//! its own stdout, which the caller consumes. Both run as child processes
//! with bounded pipes, so a slow consumer slows the whole chain down.
//!
//! A supervisor task owns both children. It forwards bytes between them,
//! collects stderr, and reports a single [`PipelineOutcome`] once both have
//! exited or the run was cancelled.

use crate::config::{ExtractorSettings, TranscoderSettings, URL_PLACEHOLDER};
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PUMP_BUFFER_SIZE: usize = 64 * 1024;

/// Which half of the pipeline an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extractor,
    Transcoder,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extractor => f.write_str("extractor"),
            Stage::Transcoder => f.write_str("transcoder"),
        }
    }
}

/// How the transcoder's input is ended once the extractor stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// Flush and close, letting the transcoder finish the stream
    Close,
    /// Drop without flushing and stop the transcoder
    Destroy,
}

impl InputEnd {
    /// Clean extractor exit closes the input, anything else destroys it
    pub fn after(extractor_exit: Option<&ExitStatus>) -> Self {
        match extractor_exit {
            Some(status) if status.success() => InputEnd::Close,
            _ => InputEnd::Destroy,
        }
    }
}

/// Whether a failure is the server's fault or the request's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or broken tooling (500)
    Environment,
    /// The tool ran and rejected the input (422)
    Content,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{program} executable not found on server PATH")]
    ExtractorNotFound { program: String },

    #[error("transcoder executable not found on server PATH: {program}")]
    TranscoderNotFound { program: String },

    #[error("failed to start {stage}: {message}")]
    Spawn { stage: Stage, message: String },

    #[error("extractor exited with code {code:?}: {stderr}")]
    ExtractorFailed { code: Option<i32>, stderr: String },

    #[error("transcoder exited with code {code:?}: {stderr}")]
    TranscoderFailed { code: Option<i32>, stderr: String },

    #[error("download produced no audio")]
    EmptyOutput,

    #[error("{0}")]
    MalformedOutput(String),
}

impl ToolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ToolError::ExtractorNotFound { .. }
            | ToolError::TranscoderNotFound { .. }
            | ToolError::Spawn { .. } => FailureKind::Environment,
            ToolError::ExtractorFailed { .. }
            | ToolError::TranscoderFailed { .. }
            | ToolError::EmptyOutput
            | ToolError::MalformedOutput(_) => FailureKind::Content,
        }
    }

    /// Message suitable for an HTTP client
    ///
    /// Tool failures report the trimmed stderr when there is any.
    pub fn reason(&self) -> String {
        match self {
            ToolError::ExtractorFailed { stderr, .. } => {
                non_empty_or(stderr, "extractor failed to fetch the track")
            }
            ToolError::TranscoderFailed { stderr, .. } => {
                non_empty_or(stderr, "transcoder failed to convert the track")
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn from_spawn(stage: Stage, program: &str, err: &io::Error) -> Self {
        match (err.kind(), stage) {
            (io::ErrorKind::NotFound, Stage::Extractor) => ToolError::ExtractorNotFound {
                program: program.to_string(),
            },
            (io::ErrorKind::NotFound, Stage::Transcoder) => ToolError::TranscoderNotFound {
                program: program.to_string(),
            },
            _ => ToolError::Spawn {
                stage,
                message: err.to_string(),
            },
        }
    }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// External program plus argument template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments with `{url}` replaced by the locator
    pub fn render_args(&self, locator: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, locator))
            .collect()
    }

    fn command(&self, locator: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.render_args(locator)).kill_on_drop(true);
        command
    }
}

/// Final state of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Both stages exited cleanly
    Completed { bytes_forwarded: u64 },
    /// A stage failed; the first failure wins
    Failed(ToolError),
    /// The consumer went away and both processes were killed
    Cancelled,
}

/// Live handles of a running pipeline
pub struct Pipeline {
    /// Transcoder stdout, the MP3 stream
    pub output: ChildStdout,
    /// Resolves once both processes are gone
    pub outcome: oneshot::Receiver<PipelineOutcome>,
    /// Cancelling kills both processes
    pub cancel: CancellationToken,
}

/// Spawns extractor/transcoder pairs
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    extractor: ToolCommand,
    transcoder: ToolCommand,
}

impl PipelineRunner {
    pub fn new(extractor: ToolCommand, transcoder: ToolCommand) -> Self {
        Self {
            extractor,
            transcoder,
        }
    }

    pub fn from_settings(extractor: &ExtractorSettings, transcoder: &TranscoderSettings) -> Self {
        Self::new(
            ToolCommand::new(&extractor.program, &extractor.download_args),
            ToolCommand::new(&transcoder.program, &transcoder.args),
        )
    }

    /// Start both processes and return immediately
    ///
    /// Spawn failures are returned directly; everything after that is
    /// reported through [`Pipeline::outcome`].
    pub fn spawn(&self, locator: &str) -> Result<Pipeline, ToolError> {
        let locator = locator.trim();

        let mut transcoder = self
            .transcoder
            .command(locator)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::from_spawn(Stage::Transcoder, &self.transcoder.program, &e))?;

        // Dropping `transcoder` on the error path kills it
        let mut extractor = self
            .extractor
            .command(locator)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::from_spawn(Stage::Extractor, &self.extractor.program, &e))?;

        let Pipes {
            extractor_out,
            transcoder_in,
            output,
        } = Pipes::take(&mut extractor, &mut transcoder)?;

        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        info!(
            locator,
            extractor = %self.extractor.program,
            transcoder = %self.transcoder.program,
            "Pipeline started"
        );

        let token = cancel.clone();
        let locator = locator.to_string();
        tokio::spawn(async move {
            let outcome =
                supervise(extractor, transcoder, extractor_out, transcoder_in, token).await;

            match &outcome {
                PipelineOutcome::Completed { bytes_forwarded } => {
                    debug!(locator = %locator, bytes_forwarded, "Pipeline finished");
                }
                PipelineOutcome::Failed(err) => {
                    debug!(locator = %locator, error = %err, "Pipeline failed");
                }
                PipelineOutcome::Cancelled => {
                    info!(locator = %locator, "Pipeline cancelled, processes killed");
                }
            }

            // Receiver may be gone already
            let _ = outcome_tx.send(outcome);
        });

        Ok(Pipeline {
            output,
            outcome: outcome_rx,
            cancel,
        })
    }
}

struct Pipes {
    extractor_out: ChildStdout,
    transcoder_in: ChildStdin,
    output: ChildStdout,
}

impl Pipes {
    fn take(extractor: &mut Child, transcoder: &mut Child) -> Result<Self, ToolError> {
        let missing = |stage: Stage, pipe: &str| ToolError::Spawn {
            stage,
            message: format!("{} was not captured", pipe),
        };

        Ok(Self {
            extractor_out: extractor
                .stdout
                .take()
                .ok_or_else(|| missing(Stage::Extractor, "stdout"))?,
            transcoder_in: transcoder
                .stdin
                .take()
                .ok_or_else(|| missing(Stage::Transcoder, "stdin"))?,
            output: transcoder
                .stdout
                .take()
                .ok_or_else(|| missing(Stage::Transcoder, "stdout"))?,
        })
    }
}

async fn supervise(
    mut extractor: Child,
    mut transcoder: Child,
    extractor_out: ChildStdout,
    transcoder_in: ChildStdin,
    cancel: CancellationToken,
) -> PipelineOutcome {
    let extractor_err = extractor
        .stderr
        .take()
        .map(|stderr| tokio::spawn(collect_stderr(Stage::Extractor, stderr)));
    let transcoder_err = transcoder
        .stderr
        .take()
        .map(|stderr| tokio::spawn(collect_stderr(Stage::Transcoder, stderr)));

    let finished = tokio::select! {
        exits = run_to_exit(&mut extractor, &mut transcoder, extractor_out, transcoder_in) => Some(exits),
        () = cancel.cancelled() => None,
    };

    let Some(exits) = finished else {
        let _ = extractor.start_kill();
        let _ = transcoder.start_kill();
        let _ = extractor.wait().await;
        let _ = transcoder.wait().await;
        return PipelineOutcome::Cancelled;
    };

    let extractor_stderr = join_stderr(extractor_err).await;
    let transcoder_stderr = join_stderr(transcoder_err).await;

    exits.into_outcome(extractor_stderr, transcoder_stderr)
}

struct Exits {
    extractor: io::Result<ExitStatus>,
    transcoder: io::Result<ExitStatus>,
    bytes_forwarded: u64,
    /// The transcoder failed while input was still flowing and the extractor
    /// was killed because of it
    transcoder_failed_first: bool,
}

impl Exits {
    fn into_outcome(self, extractor_stderr: String, transcoder_stderr: String) -> PipelineOutcome {
        let extractor = check_exit(Stage::Extractor, self.extractor, &extractor_stderr);
        let transcoder = check_exit(Stage::Transcoder, self.transcoder, &transcoder_stderr);

        let verdict = if self.transcoder_failed_first {
            transcoder.and(extractor)
        } else {
            extractor.and(transcoder)
        };

        match verdict {
            Ok(()) => PipelineOutcome::Completed {
                bytes_forwarded: self.bytes_forwarded,
            },
            Err(err) => PipelineOutcome::Failed(err),
        }
    }
}

fn check_exit(stage: Stage, exit: io::Result<ExitStatus>, stderr: &str) -> Result<(), ToolError> {
    let status = exit.map_err(|e| ToolError::Spawn {
        stage,
        message: e.to_string(),
    })?;
    if status.success() {
        return Ok(());
    }

    let code = status.code();
    let stderr = stderr.trim().to_string();
    Err(match stage {
        Stage::Extractor => ToolError::ExtractorFailed { code, stderr },
        Stage::Transcoder => ToolError::TranscoderFailed { code, stderr },
    })
}

async fn run_to_exit(
    extractor: &mut Child,
    transcoder: &mut Child,
    extractor_out: ChildStdout,
    transcoder_in: ChildStdin,
) -> Exits {
    let mut pumping = Box::pin(pump(extractor_out, transcoder_in));

    let first_done = tokio::select! {
        pumped = &mut pumping => Ok(pumped),
        exit = transcoder.wait() => Err(exit),
    };

    let (bytes_forwarded, input, early_exit) = match first_done {
        Ok((forwarded, input)) => (forwarded, input, None),
        Err(exit) => {
            // A failed transcoder produces no more output
            if !matches!(&exit, Ok(status) if status.success()) {
                debug!("Transcoder failed before its input ended, stopping extractor");
                let _ = extractor.start_kill();
            }
            let (forwarded, input) = pumping.await;
            (forwarded, input, Some(exit))
        }
    };

    let extractor_exit = extractor.wait().await;

    let (transcoder_exit, transcoder_failed_first) = match early_exit {
        Some(exit) => {
            drop(input);
            let failed = !matches!(&exit, Ok(status) if status.success());
            (exit, failed)
        }
        None => {
            match InputEnd::after(extractor_exit.as_ref().ok()) {
                InputEnd::Close => {
                    if let Some(mut input) = input {
                        if let Err(e) = input.shutdown().await {
                            debug!(error = %e, "Closing transcoder input failed");
                        }
                    }
                }
                InputEnd::Destroy => {
                    drop(input);
                    let _ = transcoder.start_kill();
                }
            }
            (transcoder.wait().await, false)
        }
    };

    Exits {
        extractor: extractor_exit,
        transcoder: transcoder_exit,
        bytes_forwarded,
        transcoder_failed_first,
    }
}

/// Copy `from` into `to` until `from` ends
///
/// A write failure (usually the transcoder exiting early) drops the input
/// and keeps draining `from` so the extractor is never blocked on a full
/// pipe. Returns the bytes delivered and the input if it is still usable.
async fn pump<R, W>(mut from: R, to: W) -> (u64, Option<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    let mut sink = Some(to);
    let mut forwarded = 0u64;

    loop {
        let n = match from.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Reading extractor output failed");
                break;
            }
        };

        if let Some(input) = sink.as_mut() {
            match input.write_all(&buf[..n]).await {
                Ok(()) => forwarded += n as u64,
                Err(e) => {
                    debug!(error = %e, "Transcoder input closed, discarding extractor output");
                    sink = None;
                }
            }
        }
    }

    (forwarded, sink)
}

async fn collect_stderr<R: AsyncRead + Unpin>(stage: Stage, mut stderr: R) -> String {
    let mut raw = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut raw).await {
        debug!(%stage, error = %e, "Reading stderr failed");
    }

    let text = String::from_utf8_lossy(&raw).into_owned();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        debug!(%stage, "{}", line);
    }
    text
}

async fn join_stderr(handle: Option<tokio::task::JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            warn!(error = %e, "Stderr collector failed");
            String::new()
        }),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[test]
    fn test_input_end_follows_extractor_exit() {
        assert_eq!(InputEnd::after(Some(&exit_status(0))), InputEnd::Close);
        assert_eq!(InputEnd::after(Some(&exit_status(1))), InputEnd::Destroy);
        assert_eq!(InputEnd::after(None), InputEnd::Destroy);
    }

    #[cfg(unix)]
    #[test]
    fn test_outcome_blames_the_stage_that_failed_first() {
        let exits = |transcoder_failed_first| Exits {
            extractor: Ok(exit_status(9)),
            transcoder: Ok(exit_status(1)),
            bytes_forwarded: 0,
            transcoder_failed_first,
        };

        assert!(matches!(
            exits(false).into_outcome(String::new(), "bad input".to_string()),
            PipelineOutcome::Failed(ToolError::ExtractorFailed { code: Some(9), .. })
        ));
        assert_eq!(
            exits(true).into_outcome(String::new(), " bad input\n".to_string()),
            PipelineOutcome::Failed(ToolError::TranscoderFailed {
                code: Some(1),
                stderr: "bad input".to_string(),
            })
        );
    }

    #[test]
    fn test_render_args_substitutes_locator() {
        let command = ToolCommand::new("yt-dlp", ["-o", "-", "{url}", "--referer={url}"]);
        assert_eq!(
            command.render_args("https://example.com/v"),
            vec![
                "-o",
                "-",
                "https://example.com/v",
                "--referer=https://example.com/v"
            ]
        );
    }

    #[test]
    fn test_failure_kinds() {
        let missing = ToolError::TranscoderNotFound {
            program: "ffmpeg".to_string(),
        };
        assert_eq!(missing.kind(), FailureKind::Environment);
        assert!(missing.reason().contains("transcoder"));
        assert!(missing.reason().contains("not found"));

        let rejected = ToolError::ExtractorFailed {
            code: Some(1),
            stderr: "  ERROR: Video unavailable\n".to_string(),
        };
        assert_eq!(rejected.kind(), FailureKind::Content);
        assert_eq!(rejected.reason(), "ERROR: Video unavailable");

        let silent = ToolError::ExtractorFailed {
            code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(silent.reason(), "extractor failed to fetch the track");
    }

    #[test]
    fn test_spawn_error_mapping() {
        let not_found = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(
            ToolError::from_spawn(Stage::Extractor, "yt-dlp", &not_found),
            ToolError::ExtractorNotFound {
                program: "yt-dlp".to_string()
            }
        );

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            ToolError::from_spawn(Stage::Transcoder, "ffmpeg", &denied),
            ToolError::Spawn {
                stage: Stage::Transcoder,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_pump_forwards_everything() {
        let data = vec![7u8; PUMP_BUFFER_SIZE * 2 + 5];
        let (forwarded, sink) = pump(&data[..], Vec::new()).await;
        assert_eq!(forwarded, data.len() as u64);
        assert_eq!(sink.unwrap(), data);
    }

    #[tokio::test]
    async fn test_pump_drains_after_write_failure() {
        let (writer, reader) = tokio::io::duplex(16);
        drop(reader);

        let data = vec![1u8; PUMP_BUFFER_SIZE * 3];
        let (forwarded, sink) = pump(&data[..], writer).await;
        assert_eq!(forwarded, 0);
        assert!(sink.is_none());
    }
}
