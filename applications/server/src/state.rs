/// Shared application state
use crate::config::ServerConfig;
use crate::middleware::ApiKeys;
use crate::services::{Extractor, PipelineRunner};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineRunner>,
    pub extractor: Arc<Extractor>,
    pub api_keys: ApiKeys,
}

impl AppState {
    pub fn new(pipeline: PipelineRunner, extractor: Extractor, api_keys: ApiKeys) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            extractor: Arc::new(extractor),
            api_keys,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            PipelineRunner::from_settings(&config.extractor, &config.transcoder),
            Extractor::from_settings(&config.extractor),
            ApiKeys::new(config.auth.api_keys.clone()),
        )
    }
}
