//! Axum route handlers for the working document, background context and
//! compiled artifacts.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

const PREVIEW_CHARS: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub file_type: String,
    pub preview: String,
    pub persisted: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentResumeResponse {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextBody {
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /upload
///
/// Multipart form with a `file` field holding a `.tex` document. Replaces the
/// working document.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;

        let stored = state.store.save_upload(&filename, &bytes).await?;
        return Ok(Json(UploadResponse {
            success: true,
            preview: preview(&stored.content),
            filename: stored.filename,
            file_type: stored.file_type,
            persisted: true,
        }));
    }

    Err(AppError::Validation("No file provided".to_string()))
}

/// GET /current-resume
pub async fn handle_current_resume(
    State(state): State<AppState>,
) -> Result<Json<CurrentResumeResponse>, AppError> {
    let response = match state.store.current_resume().await? {
        Some(resume) => CurrentResumeResponse {
            loaded: true,
            preview: Some(preview(&resume.content)),
            filename: Some(resume.filename),
            file_type: Some(resume.file_type),
            uploaded_at: resume.uploaded_at,
        },
        None => CurrentResumeResponse {
            loaded: false,
            filename: None,
            file_type: None,
            preview: None,
            uploaded_at: None,
        },
    };
    Ok(Json(response))
}

/// GET /rag-context
pub async fn handle_get_context(
    State(state): State<AppState>,
) -> Result<Json<ContextBody>, AppError> {
    let context = state.store.load_context().await?;
    Ok(Json(ContextBody { context }))
}

/// POST /rag-context
pub async fn handle_update_context(
    State(state): State<AppState>,
    Json(body): Json<ContextBody>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.save_context(&body.context).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /compiled/:filename
///
/// Serves a durable render artifact as a download.
pub async fn handle_download_compiled(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (name, bytes) = state
        .store
        .compiled_artifact(&filename)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("compiled file '{filename}' not found")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// First characters of a document, with `...` when cut.
pub(crate) fn preview(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
