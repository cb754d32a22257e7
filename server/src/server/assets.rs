//! Embedded web page (web/) and the JSON 404 fallback.

use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;
use serde_json::json;

#[derive(Embed)]
#[folder = "web/"]
struct WebAssets;

/// Serve the editor page for bare `/` requests.
pub async fn index() -> Response {
    serve_embedded::<WebAssets>("index.html")
}

/// Fallback handler: embedded assets by path, otherwise a JSON 404.
pub async fn fallback(uri: Uri) -> Response {
    let request_path = uri.path();
    match WebAssets::get(request_path.trim_start_matches('/')) {
        Some(_) => serve_embedded::<WebAssets>(request_path.trim_start_matches('/')),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({
                "error": "Not Found",
                "path": request_path,
            })),
        )
            .into_response(),
    }
}

fn serve_embedded<E: Embed>(path: &str) -> Response {
    match E::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
