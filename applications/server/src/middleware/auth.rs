/// API key middleware
use crate::error::ServerError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Accepted API keys; an empty set turns the check off
#[derive(Debug, Clone, Default)]
pub struct ApiKeys(Arc<Vec<String>>);

impl ApiKeys {
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self(Arc::new(keys))
    }

    pub fn is_enabled(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }
}

/// Rejects requests without a known `X-API-Key`
pub async fn api_key_middleware(
    State(keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if !keys.is_enabled() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(key) if keys.accepts(key) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected request without a valid API key");
            Err(ServerError::Unauthorized)
        }
    }
}
