//! Image edit API.

use axum::extract::{Multipart, State};

use crate::app::SharedState;
use crate::services::editor::EditParams;

use super::{ApiResponse, UploadForm, respond};

/// POST /edit – Upload an image and optionally resize it
pub async fn edit_image(State(state): State<SharedState>, multipart: Multipart) -> ApiResponse {
    let mut form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let upload = match form.take_file() {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };

    let params = EditParams {
        resize_mode: form.field("resize_mode"),
        width: form.field("width"),
        height: form.field("height"),
        percentage: form.field("percentage"),
        preset: form.field("preset"),
    };

    respond(state.editor().edit(upload, &params).await)
}
