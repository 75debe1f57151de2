// src/api/extract.rs
// POST /api/extract: multipart upload (field "file") to extracted text

use axum::{
    Json,
    extract::{Multipart, multipart::MultipartRejection},
    http::StatusCode,
};
use tracing::info;

use super::error::{ApiError, ApiResult, IntoApiError};
use crate::document::{self, DocumentKind, ExtractedDocument};

pub async fn extract_handler(
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ExtractedDocument>> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::custom(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no filename"))?;

        // Fail on the extension before buffering the upload
        DocumentKind::from_filename(&filename)?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::custom(e.status(), e.body_text()))?;

        info!("Extracting {} ({} bytes)", filename, bytes.len());

        let extracted = tokio::task::spawn_blocking(move || document::extract(&filename, &bytes))
            .await
            .into_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to extract document text.")??;

        return Ok(Json(extracted));
    }

    Err(ApiError::bad_request("No file provided"))
}
