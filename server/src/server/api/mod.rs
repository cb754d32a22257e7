//! REST API handlers for image uploads.

pub mod convert;
pub mod edit;

use std::collections::HashMap;

use axum::Json;
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::services::editor::{OperationResult, Upload};

/// Status code plus the uniform JSON body.
pub type ApiResponse = (StatusCode, Json<OperationResult>);

/// Map an operation outcome onto HTTP: any failure is a server error.
pub fn respond(result: OperationResult) -> ApiResponse {
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result))
}

/// Failure response for requests rejected before processing starts.
pub fn err_json(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(OperationResult::failure(message)))
}

/// A parsed multipart upload form: the `file` part plus every text field.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<Upload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drain `multipart`, keeping the first `file` part.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiResponse> {
        let mut form = UploadForm::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(err_json(e.status(), &e.body_text())),
            };

            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| err_json(e.status(), &e.body_text()))?;
                if form.file.is_none() {
                    form.file = Some(Upload {
                        filename,
                        data: data.to_vec(),
                    });
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| err_json(e.status(), &e.body_text()))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Take the uploaded file or fail with 400.
    pub fn take_file(&mut self) -> Result<Upload, ApiResponse> {
        match self.file.take() {
            Some(upload) if !upload.data.is_empty() => Ok(upload),
            Some(_) => Err(err_json(StatusCode::BAD_REQUEST, "Uploaded file is empty")),
            None => Err(err_json(StatusCode::BAD_REQUEST, "No file provided")),
        }
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}
