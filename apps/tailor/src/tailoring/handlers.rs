//! Axum route handler for the tailoring API.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::tailoring::pipeline::{tailor_resume, TailorReport};
use crate::tailoring::session::TailoringSession;

#[derive(Debug, Deserialize)]
pub struct TailorRequest {
    #[serde(default)]
    pub job_description: String,
}

/// POST /tailor
///
/// Tailors the working document to `job_description`, optimizes its layout and
/// writes the compiled PDF plus its source under `compiled/`.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailorReport>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("No job description provided".to_string()));
    }

    let resume = state.store.current_resume().await?.ok_or_else(|| {
        AppError::Validation("No resume uploaded. Please upload a resume first.".to_string())
    })?;
    let background = state.store.load_context().await?;

    let session = TailoringSession::new(
        resume.filename,
        resume.content,
        request.job_description,
        Some(background),
    );

    let report = tailor_resume(
        &session,
        state.llm.as_ref(),
        state.renderer.as_ref(),
        &state.config.optimizer,
    )
    .await?;

    let source_path = state
        .store
        .save_tailored_source(&session.document_name, &report.tailored_resume)
        .await?;
    info!(
        source = %source_path.display(),
        converged = report.converged,
        adjustments = report.adjustment_count,
        "tailoring complete"
    );

    Ok(Json(report))
}
