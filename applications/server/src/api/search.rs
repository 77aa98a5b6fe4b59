/// Search API routes
use crate::{error::Result, error::ServerError, state::AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use flashtune_core::SearchResult;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// GET /search?query=...
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ServerError::BadRequest("query is required".to_string()))?;

    let results = state.extractor.search(query).await?;
    tracing::info!(query, results = results.len(), "Search completed");

    Ok(Json(results))
}
