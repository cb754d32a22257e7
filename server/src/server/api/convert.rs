//! WebP conversion API.

use axum::extract::{Multipart, State};

use crate::app::SharedState;

use super::{ApiResponse, UploadForm, respond};

/// POST /convert – Upload an image and convert it to WebP
///
/// Also mounted at POST /upload for older clients.
pub async fn convert_image(State(state): State<SharedState>, multipart: Multipart) -> ApiResponse {
    let mut form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let upload = match form.take_file() {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };

    let quality = form.field("quality");
    respond(state.editor().convert(upload, quality.as_deref()).await)
}
