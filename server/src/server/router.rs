use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::{api, assets};
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    let uploads = ServeDir::new(state.staging().root());
    let prefix = state.staging().url_prefix().to_string();
    let max_upload_bytes = state.config().max_upload_bytes;

    Router::new()
        // --- Core ---
        .route("/", get(assets::index))
        .route("/health", get(health_handler))
        // --- Uploads ---
        .merge(build_upload_routes(max_upload_bytes))
        // --- Artifacts ---
        .nest_service(&prefix, uploads)
        .fallback(assets::fallback)
        // --- Middleware ---
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn build_upload_routes(max_upload_bytes: usize) -> Router<SharedState> {
    Router::new()
        .route("/edit", post(api::edit::edit_image))
        .route("/convert", post(api::convert::convert_image))
        .route("/upload", post(api::convert::convert_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "healthy" }))
}
