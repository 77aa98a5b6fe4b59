//! FlashTune backend
//!
//! Thin HTTP front for an external media extractor: search, remote playlist
//! listing, and a streamed extractor→transcoder download that yields MP3.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;

/// Build the application router
///
/// `/health` is public; every other route sits behind the API key check.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/search", get(api::search::search))
        .route("/playlist-info", get(api::playlist::playlist_info))
        .route(
            "/download",
            get(api::download::download_get).post(api::download::download_post),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.api_keys.clone(),
            middleware::api_key_middleware,
        ));

    Router::new()
        .route("/health", get(api::health::health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CorsLayer::permissive())
}
