use axum::{Router, routing::get, routing::post};
use tower_http::decompression::RequestDecompressionLayer;

use super::{
    services::{health, ping, submit_images},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/api/images", post(submit_images))
        .with_state(state)
        // Transparently decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}
