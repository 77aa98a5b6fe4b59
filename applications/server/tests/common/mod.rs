//! Common test utilities and fixtures
#![allow(dead_code)]

use axum::{body::Body, http::Response, Router};
use flashtune_server::{
    create_router,
    middleware::ApiKeys,
    services::{Extractor, PipelineRunner, ToolCommand},
    state::AppState,
};
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};

pub const TEST_API_KEY: &str = "test-api-key";

/// A program name that is never on PATH
pub const MISSING_TRANSCODER: &str = "flashtune-test-missing-transcoder";
pub const MISSING_EXTRACTOR: &str = "flashtune-test-missing-extractor";

/// Inline shell tool; the locator arrives as `$1`
pub fn sh(script: &str) -> ToolCommand {
    ToolCommand::new(
        "sh",
        [
            "-c".to_string(),
            script.to_string(),
            "tool".to_string(),
            "{url}".to_string(),
        ],
    )
}

/// Transcoder stand-in that passes bytes through unchanged
pub fn passthrough() -> ToolCommand {
    sh("exec cat")
}

/// Router with the given download tools and no metadata extractor
pub fn download_app(extractor: ToolCommand, transcoder: ToolCommand, keys: &[&str]) -> Router {
    app(
        PipelineRunner::new(extractor, transcoder),
        Extractor::new(MISSING_EXTRACTOR, 5),
        keys,
    )
}

/// Router whose metadata extractor is the given executable
pub fn metadata_app(program: &Path, keys: &[&str]) -> Router {
    app(
        PipelineRunner::new(passthrough(), passthrough()),
        Extractor::new(program.to_string_lossy(), 5),
        keys,
    )
}

fn app(pipeline: PipelineRunner, extractor: Extractor, keys: &[&str]) -> Router {
    let keys = ApiKeys::new(keys.iter().map(|k| (*k).to_string()).collect());
    create_router(AppState::new(pipeline, extractor, keys))
}

/// Write an executable shell script into `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
