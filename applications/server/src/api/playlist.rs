/// Remote playlist listing
use crate::{api::required_locator, error::Result, state::AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use flashtune_core::PlaylistInfo;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PlaylistParams {
    pub url: Option<String>,
}

/// GET /playlist-info?url=...
pub async fn playlist_info(
    State(state): State<AppState>,
    Query(params): Query<PlaylistParams>,
) -> Result<Json<PlaylistInfo>> {
    let url = required_locator(params.url.as_deref())?;

    let info = state.extractor.playlist_info(url).await?;
    tracing::info!(url, tracks = info.track_count, "Playlist listed");

    Ok(Json(info))
}
