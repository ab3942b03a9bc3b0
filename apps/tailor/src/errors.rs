use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::render::RenderError;
use crate::storage::StorageError;
use crate::tailoring::extractor::ExtractionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Render(e) => match e {
                RenderError::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "RENDER_REJECTED"),
                RenderError::CompilerUnavailable { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "COMPILER_UNAVAILABLE")
                }
                RenderError::TimedOut(_) => (StatusCode::GATEWAY_TIMEOUT, "RENDER_TIMEOUT"),
                RenderError::InvalidName(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                RenderError::MissingArtifact | RenderError::Unreadable(_) | RenderError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR")
                }
            },
            AppError::Extraction(_) => (StatusCode::BAD_GATEWAY, "EXTRACTION_ERROR"),
            AppError::Llm(_) => (StatusCode::BAD_GATEWAY, "LLM_ERROR"),
            AppError::Storage(e) => match e {
                StorageError::InvalidFilename(_)
                | StorageError::UnsupportedFileType(_)
                | StorageError::NotUtf8 => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                StorageError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
                StorageError::Io(_) | StorageError::Metadata(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                }
            },
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                "The language model request failed".to_string()
            }
            AppError::Storage(e @ (StorageError::Io(_) | StorageError::Metadata(_))) => {
                tracing::error!("Storage error: {e}");
                "A storage error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::error!("{other}");
                }
                other.to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
