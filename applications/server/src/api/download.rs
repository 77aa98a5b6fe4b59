//! Streaming download endpoint
//!
//! The status code is chosen only after the pipeline has produced its first
//! chunk or finished without producing any. From then on the response is a
//! plain byte stream; later failures are logged, and a client that goes away
//! takes both processes down with it.

use crate::{
    api::required_locator,
    error::{Result, ServerError},
    services::{
        FailureAction, Pipeline, PipelineOutcome, ResponseTracker, ToolError,
    },
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{process::ChildStdout, sync::oneshot};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    pub url: Option<String>,
}

/// GET /download?url=...
pub async fn download_get(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response> {
    stream_download(&state, params.url).await
}

/// POST /download with `{"url": ...}`; falls back to the query string
pub async fn download_post(
    State(state): State<AppState>,
    Query(query): Query<DownloadParams>,
    body: Option<Json<DownloadParams>>,
) -> Result<Response> {
    let url = body.and_then(|Json(params)| params.url).or(query.url);
    stream_download(&state, url).await
}

async fn stream_download(state: &AppState, url: Option<String>) -> Result<Response> {
    let locator = required_locator(url.as_deref())?.to_string();

    let tracker = ResponseTracker::new();
    let Pipeline {
        output,
        outcome,
        cancel,
    } = state.pipeline.spawn(&locator)?;
    tracker.spawned();

    let mut guard = DisconnectGuard::new(tracker.clone(), cancel);
    let mut chunks = ReaderStream::new(output);

    let first = match chunks.next().await {
        Some(Ok(bytes)) => Some(bytes),
        Some(Err(e)) => {
            debug!(error = %e, "Reading transcoder output failed");
            None
        }
        None => None,
    };

    let Some(first) = first else {
        let err = match outcome.await {
            Ok(PipelineOutcome::Failed(err)) => err,
            Ok(PipelineOutcome::Completed { .. }) => ToolError::EmptyOutput,
            Ok(PipelineOutcome::Cancelled) | Err(_) => {
                guard.disarm();
                return Err(ServerError::Internal(
                    "download pipeline stopped unexpectedly".to_string(),
                ));
            }
        };
        guard.disarm();

        // Nothing has been sent yet, so the failure becomes the response
        tracker.failed();
        return Err(err.into());
    };

    tracker.streaming();
    info!(locator = %locator, "Streaming download");
    tokio::spawn(watch_outcome(locator, outcome, tracker));

    let body = DownloadBody {
        first: Some(first),
        rest: chunks,
        guard,
    };

    Ok((
        [(header::CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(body),
    )
        .into_response())
}

async fn watch_outcome(
    locator: String,
    outcome: oneshot::Receiver<PipelineOutcome>,
    tracker: ResponseTracker,
) {
    match outcome.await {
        Ok(PipelineOutcome::Completed { bytes_forwarded }) => {
            tracker.completed();
            info!(locator = %locator, bytes_forwarded, "Download finished");
        }
        Ok(PipelineOutcome::Failed(err)) => match tracker.failed() {
            FailureAction::LogOnly => {
                warn!(locator = %locator, error = %err, "Download failed after streaming started");
            }
            FailureAction::Respond | FailureAction::Ignore => {
                debug!(locator = %locator, error = %err, "Download failed after client left");
            }
        },
        Ok(PipelineOutcome::Cancelled) | Err(_) => {
            debug!(locator = %locator, "Download cancelled");
        }
    }
}

/// Cancels the pipeline when dropped before the stream ended
struct DisconnectGuard {
    tracker: ResponseTracker,
    cancel: CancellationToken,
    armed: bool,
}

impl DisconnectGuard {
    fn new(tracker: ResponseTracker, cancel: CancellationToken) -> Self {
        Self {
            tracker,
            cancel,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed && self.tracker.disconnected() {
            info!("Client disconnected, stopping download pipeline");
            self.cancel.cancel();
        }
    }
}

/// Response body: the already-read first chunk, then the rest of stdout
struct DownloadBody {
    first: Option<Bytes>,
    rest: ReaderStream<ChildStdout>,
    guard: DisconnectGuard,
}

impl Stream for DownloadBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(first) = this.first.take() {
            return Poll::Ready(Some(Ok(first)));
        }

        match Pin::new(&mut this.rest).poll_next(cx) {
            Poll::Ready(None) => {
                this.guard.disarm();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
