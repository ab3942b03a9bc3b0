//! Optimization Loop — drives a document toward one page inside the fill band.
//!
//! # State machine
//! ```text
//! RENDER (scratch) → EVALUATE ─┬─ Acceptable ─────────────────────────→ FINAL RENDER
//!                              ├─ Overflow / TooDense → SHORTEN ─┐
//!                              ├─ TooSparse          → EXPAND  ──┴→ RENDER
//!                              └─ (budget spent)     → ABORT ─────────→ FINAL RENDER
//! ```
//! - Page count above one always means SHORTEN, whatever the fill ratio says.
//! - At most `max_attempts` correction rounds. Running out is not an error: the
//!   current document is rendered durably and reported as-is.
//! - Render, service and extraction failures end the run immediately.
//! - The durable artifact is written exactly once, after the terminal decision.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{evaluate_page_fill, Correction, FillBounds, PageFillVerdict};
use crate::llm_client::TextGenerator;
use crate::render::{DocumentRenderer, RenderResult, RenderTarget};
use crate::tailoring::corrector::{request_expand, request_shorten, CorrectionRequest};
use crate::tailoring::session::TailoringSession;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Loop policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub min_fill: f64,
    pub max_fill: f64,
    /// Maximum number of correction rounds.
    pub max_attempts: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_fill: 0.88,
            max_fill: 0.96,
            max_attempts: 5,
        }
    }
}

impl OptimizerConfig {
    pub fn bounds(&self) -> FillBounds {
        FillBounds {
            min_fill: self.min_fill,
            max_fill: self.max_fill,
        }
    }
}

/// Direction of the most recent correction round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    #[default]
    None,
    Shortened,
    Expanded,
}

impl From<Correction> for AdjustmentDirection {
    fn from(correction: Correction) -> Self {
        match correction {
            Correction::Shorten => AdjustmentDirection::Shortened,
            Correction::Expand => AdjustmentDirection::Expanded,
        }
    }
}

/// Per-run loop state. Lives only as long as one `optimize` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizationState {
    pub attempt_index: u32,
    pub adjustment_count: u32,
    pub last_adjustment: AdjustmentDirection,
}

impl OptimizationState {
    fn record(&mut self, correction: Correction) {
        self.attempt_index += 1;
        self.adjustment_count += 1;
        self.last_adjustment = correction.into();
    }
}

/// How the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Last scratch render was one page inside the band.
    Accepted,
    /// Correction budget spent; the document may still violate the constraints.
    Exhausted,
}

/// One EVALUATE step, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub attempt: u32,
    pub page_count: u32,
    pub fill_ratio: Option<f64>,
    pub verdict: PageFillVerdict,
}

/// Result of a run that could proceed to the end.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutcome {
    pub document: String,
    pub final_render: RenderResult,
    pub state: OptimizationState,
    pub termination: Termination,
    pub history: Vec<IterationRecord>,
}

impl OptimizationOutcome {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Accepted
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Runs the render → evaluate → correct loop on `initial_document`.
#[instrument(
    skip_all,
    fields(run_id = %Uuid::new_v4(), document = %session.document_name)
)]
pub async fn optimize(
    session: &TailoringSession,
    initial_document: String,
    llm: &dyn TextGenerator,
    renderer: &dyn DocumentRenderer,
    config: &OptimizerConfig,
) -> Result<OptimizationOutcome, AppError> {
    let bounds = config.bounds();
    let mut document = initial_document;
    let mut state = OptimizationState::default();
    let mut history = Vec::new();

    let termination = loop {
        let render = renderer
            .render(&document, &session.document_name, RenderTarget::Scratch)
            .await?;
        let verdict = evaluate_page_fill(render.page_count, render.fill_ratio, &bounds);

        info!(
            attempt = state.attempt_index,
            page_count = render.page_count,
            fill_ratio = ?render.fill_ratio,
            ?verdict,
            "optimization check"
        );
        history.push(IterationRecord {
            attempt: state.attempt_index,
            page_count: render.page_count,
            fill_ratio: render.fill_ratio,
            verdict,
        });

        let Some(correction) = verdict.correction() else {
            break Termination::Accepted;
        };

        if state.attempt_index >= config.max_attempts {
            warn!(
                attempts = state.attempt_index,
                ?verdict,
                "could not reach target layout within the correction budget"
            );
            break Termination::Exhausted;
        }

        let request = CorrectionRequest {
            source: &document,
            preamble: &session.reference_preamble,
            job_description: &session.job_description,
            page_count: render.page_count,
            fill_ratio: render.fill_ratio,
            bounds,
        };
        document = match correction {
            Correction::Shorten => request_shorten(llm, &request).await?,
            Correction::Expand => request_expand(llm, &request).await?,
        };
        state.record(correction);
    };

    let final_render = renderer
        .render(&document, &session.document_name, RenderTarget::Durable)
        .await?;

    info!(
        ?termination,
        adjustments = state.adjustment_count,
        page_count = final_render.page_count,
        fill_ratio = ?final_render.fill_ratio,
        "optimization finished"
    );
    debug!(?history, "optimization history");

    Ok(OptimizationOutcome {
        document,
        final_render,
        state,
        termination,
        history,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
