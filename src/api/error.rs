// src/api/error.rs
// JSON error responses for the HTTP API: every failure body is {"error": "<message>"}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::document::DocumentError;

#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
}

impl ApiError {
    pub fn custom(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::UNAUTHORIZED, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::custom(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::UnsupportedType(_) => ApiError::unsupported_media_type(err.to_string()),
            DocumentError::Pdf(_) | DocumentError::NotText => {
                ApiError::unprocessable_entity(err.to_string())
            }
            DocumentError::Io { .. } => {
                error!("Document I/O failure: {}", err);
                ApiError::internal("Failed to read the uploaded file.")
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Log the underlying error and replace it with a client-safe message.
pub trait IntoApiError<T> {
    fn into_api_error(self, status_code: StatusCode, message: &str) -> Result<T, ApiError>;
    fn into_internal_error(self, message: &str) -> Result<T, ApiError>;
}

impl<T, E> IntoApiError<T> for Result<T, E>
where
    E: fmt::Debug,
{
    fn into_api_error(self, status_code: StatusCode, message: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            error!("{}: {:?}", message, e);
            ApiError::custom(status_code, message)
        })
    }

    fn into_internal_error(self, message: &str) -> Result<T, ApiError> {
        self.into_api_error(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::bad_request("No document provided").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"No document provided"}"#);
    }

    #[test]
    fn test_into_api_error_extension() {
        let result: Result<i32, &str> = Err("connection reset");
        let error = result.into_internal_error("Failed to process the document.").unwrap_err();

        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "Failed to process the document.");
    }

    #[test]
    fn test_document_error_mapping() {
        let err: ApiError = DocumentError::UnsupportedType("exe".into()).into();
        assert_eq!(err.status_code, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err: ApiError = DocumentError::NotText.into();
        assert_eq!(err.status_code, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
