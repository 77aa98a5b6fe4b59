//! Pipeline runner tests against real child processes
#![cfg(unix)]

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::*;
use flashtune_server::services::{PipelineOutcome, PipelineRunner, ToolError};
use http_body_util::BodyExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tower::util::ServiceExt;

fn is_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn read_pid(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(pid) = std::fs::read_to_string(path) {
            if !pid.trim().is_empty() {
                return pid.trim().to_string();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("pid file {} never appeared", path.display());
}

async fn wait_until_dead(pid: &str) -> bool {
    for _ in 0..200 {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_completed_run_reports_forwarded_bytes() {
    let runner = PipelineRunner::new(sh("printf 'abcdef'"), passthrough());
    let mut pipeline = runner.spawn("https://example.com/v").unwrap();

    let mut output = Vec::new();
    pipeline.output.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, b"abcdef");

    let outcome = pipeline.outcome.await.unwrap();
    assert_eq!(outcome, PipelineOutcome::Completed { bytes_forwarded: 6 });
}

#[tokio::test]
async fn test_extractor_failure_wins_over_transcoder_exit() {
    let runner = PipelineRunner::new(
        sh("printf partial; echo 'ERROR: Private video' >&2; exit 1"),
        passthrough(),
    );
    let mut pipeline = runner.spawn("https://example.com/private").unwrap();

    let mut output = Vec::new();
    pipeline.output.read_to_end(&mut output).await.unwrap();

    match pipeline.outcome.await.unwrap() {
        PipelineOutcome::Failed(ToolError::ExtractorFailed { code, stderr }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "ERROR: Private video");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_early_transcoder_exit_does_not_stall_extractor() {
    // The transcoder stops reading after 16 bytes while the extractor keeps
    // writing well past the pipe buffer
    let runner = PipelineRunner::new(
        sh("head -c 1048576 /dev/zero"),
        sh("head -c 16"),
    );
    let mut pipeline = runner.spawn("https://example.com/v").unwrap();

    let mut output = Vec::new();
    pipeline.output.read_to_end(&mut output).await.unwrap();
    assert_eq!(output.len(), 16);

    let outcome = tokio::time::timeout(Duration::from_secs(10), pipeline.outcome)
        .await
        .expect("pipeline stalled")
        .unwrap();
    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_transcoder_failure_stops_extractor() {
    let dir = tempfile::tempdir().unwrap();
    let extractor_pid = dir.path().join("extractor.pid");

    let runner = PipelineRunner::new(
        sh(&format!("echo $$ > '{}'; exec yes flashtune", extractor_pid.display())),
        sh(&format!(
            "while [ ! -s '{}' ]; do sleep 0.05; done; echo 'Unknown encoder' >&2; exit 3",
            extractor_pid.display()
        )),
    );
    let mut pipeline = runner.spawn("https://example.com/live").unwrap();
    let extractor = read_pid(&extractor_pid).await;

    let mut output = Vec::new();
    pipeline.output.read_to_end(&mut output).await.unwrap();
    assert!(output.is_empty());

    let outcome = tokio::time::timeout(Duration::from_secs(10), pipeline.outcome)
        .await
        .expect("pipeline kept draining the extractor")
        .unwrap();
    assert_eq!(
        outcome,
        PipelineOutcome::Failed(ToolError::TranscoderFailed {
            code: Some(3),
            stderr: "Unknown encoder".to_string(),
        })
    );
    assert!(wait_until_dead(&extractor).await, "extractor still running");
}

#[tokio::test]
async fn test_cancel_kills_both_processes() {
    let dir = tempfile::tempdir().unwrap();
    let extractor_pid = dir.path().join("extractor.pid");
    let transcoder_pid = dir.path().join("transcoder.pid");

    let runner = PipelineRunner::new(
        sh(&format!("echo $$ > '{}'; exec yes flashtune", extractor_pid.display())),
        sh(&format!("echo $$ > '{}'; exec cat", transcoder_pid.display())),
    );
    let pipeline = runner.spawn("https://example.com/endless").unwrap();

    let extractor = read_pid(&extractor_pid).await;
    let transcoder = read_pid(&transcoder_pid).await;
    assert!(is_alive(&extractor));

    pipeline.cancel.cancel();
    assert_eq!(pipeline.outcome.await.unwrap(), PipelineOutcome::Cancelled);

    assert!(wait_until_dead(&extractor).await);
    assert!(wait_until_dead(&transcoder).await);
}

#[tokio::test]
async fn test_client_disconnect_kills_both_processes() {
    let dir = tempfile::tempdir().unwrap();
    let extractor_pid = dir.path().join("extractor.pid");
    let transcoder_pid = dir.path().join("transcoder.pid");

    let app = download_app(
        sh(&format!("echo $$ > '{}'; exec yes flashtune", extractor_pid.display())),
        sh(&format!("echo $$ > '{}'; exec cat", transcoder_pid.display())),
        &[],
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/download?url=https%3A%2F%2Fexample.com%2Fendless")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let mut received = 0;
    for _ in 0..10 {
        let frame = body.frame().await.unwrap().unwrap();
        received += frame.into_data().unwrap().len();
    }
    assert!(received > 0);

    let extractor = read_pid(&extractor_pid).await;
    let transcoder = read_pid(&transcoder_pid).await;

    drop(body);

    assert!(wait_until_dead(&extractor).await, "extractor still running");
    assert!(wait_until_dead(&transcoder).await, "transcoder still running");
}
