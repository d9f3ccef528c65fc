//! Router assembly

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::api::handlers;
use crate::AppState;

/// Uploaded files and data-URL overrides can carry a few MB of base64
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let blob_dir = ServeDir::new(&state.settings.storage.base_path);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/current", get(handlers::current))
        .route("/api/generate", post(handlers::generate))
        .route("/api/history", get(handlers::history))
        .route("/api/frame", get(handlers::frame))
        .route("/api/suggest", get(handlers::suggest))
        .route("/api/upload-seed", post(handlers::upload_seed))
        .route("/api/reset", post(handlers::reset))
        .nest_service("/blobs", blob_dir)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
