//! Tailoring pipeline: initial rewrite for a job description, then layout
//! optimization.

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::llm_client::prompts::LATEX_ONLY_SYSTEM;
use crate::llm_client::TextGenerator;
use crate::optimizer::{
    optimize, AdjustmentDirection, IterationRecord, OptimizationOutcome, OptimizerConfig,
};
use crate::render::DocumentRenderer;
use crate::tailoring::extractor::extract_document;
use crate::tailoring::prompts::{fill_template, NO_BACKGROUND, TAILOR_PROMPT_TEMPLATE, TAILOR_SYSTEM};
use crate::tailoring::session::TailoringSession;

/// What a tailoring run hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TailorReport {
    pub success: bool,
    pub original_filename: String,
    pub tailored_resume: String,
    pub page_count: u32,
    /// Rounded to two decimals. Absent when the final render is not one page.
    pub fill_ratio: Option<f64>,
    pub was_adjusted: bool,
    pub adjustment_count: u32,
    pub adjustment_type: Option<AdjustmentDirection>,
    pub converged: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled_pdf_url: Option<String>,
    /// One entry per scratch render, in order.
    pub history: Vec<IterationRecord>,
}

impl TailorReport {
    fn from_outcome(session: &TailoringSession, outcome: OptimizationOutcome) -> Self {
        let converged = outcome.converged();
        let compiled_pdf_url = outcome
            .final_render
            .artifact_path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|name| format!("/compiled/{name}"));

        Self {
            success: true,
            original_filename: session.original_filename.clone(),
            page_count: outcome.final_render.page_count,
            fill_ratio: outcome.final_render.fill_ratio.map(round_two),
            was_adjusted: outcome.state.adjustment_count > 0,
            adjustment_count: outcome.state.adjustment_count,
            adjustment_type: match outcome.state.last_adjustment {
                AdjustmentDirection::None => None,
                direction => Some(direction),
            },
            converged,
            attempts: outcome.state.attempt_index,
            compiled_pdf_url,
            tailored_resume: outcome.document,
            history: outcome.history,
        }
    }
}

/// Rewrites the session's document for its job description, then drives it
/// to a single well-filled page.
pub async fn tailor_resume(
    session: &TailoringSession,
    llm: &dyn TextGenerator,
    renderer: &dyn DocumentRenderer,
    config: &OptimizerConfig,
) -> Result<TailorReport, AppError> {
    let (system, prompt) = build_tailor_prompts(session);
    info!(
        document = %session.document_name,
        job_description_chars = session.job_description.chars().count(),
        has_background = session.background_context.is_some(),
        "requesting tailored resume"
    );

    let raw_reply = llm.complete(&system, &prompt).await?;
    debug!(
        preview = %raw_reply.chars().take(300).collect::<String>(),
        "tailoring reply received"
    );
    let tailored = extract_document(&raw_reply, &session.reference_preamble)?;

    let outcome = optimize(session, tailored, llm, renderer, config).await?;
    Ok(TailorReport::from_outcome(session, outcome))
}

/// Returns `(system_prompt, user_prompt)` for the initial tailoring request.
pub(crate) fn build_tailor_prompts(session: &TailoringSession) -> (String, String) {
    let background = session.background_context.as_deref().unwrap_or(NO_BACKGROUND);
    let prompt = fill_template(
        TAILOR_PROMPT_TEMPLATE,
        &[
            ("resume", session.original_source.as_str()),
            ("background", background),
            ("job_description", session.job_description.as_str()),
        ],
    );
    (format!("{TAILOR_SYSTEM}\n\n{LATEX_ONLY_SYSTEM}"), prompt)
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_client::LlmError;
    use crate::render::{RenderError, RenderResult, RenderTarget};

    const ORIGINAL: &str =
        "\\documentclass{article}\n\\usepackage{geometry}\n\\begin{document}\nOld\n\\end{document}";

    /// Always measures the same layout.
    struct FixedRenderer(u32, Option<f64>);

    #[async_trait]
    impl DocumentRenderer for FixedRenderer {
        async fn render(
            &self,
            _source: &str,
            document_name: &str,
            target: RenderTarget,
        ) -> Result<RenderResult, RenderError> {
            Ok(RenderResult {
                page_count: self.0,
                fill_ratio: self.1,
                artifact_path: (target == RenderTarget::Durable)
                    .then(|| PathBuf::from(format!("/data/compiled/{document_name}.pdf"))),
            })
        }
    }

    /// Replies in order, repeating the last reply.
    struct ReplyQueue {
        replies: Vec<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl ReplyQueue {
        fn new(replies: Vec<&'static str>) -> Self {
            Self {
                replies,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ReplyQueue {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(user.to_string());
            let idx = (prompts.len() - 1).min(self.replies.len() - 1);
            Ok(self.replies[idx].to_string())
        }
    }

    fn session(background: Option<&str>) -> TailoringSession {
        TailoringSession::new(
            "jane.tex",
            ORIGINAL,
            "Rust backend engineer",
            background.map(str::to_string),
        )
    }

    #[test]
    fn test_tailor_prompt_embeds_inputs() {
        let (system, prompt) = build_tailor_prompts(&session(Some("Ran a Kubernetes cluster")));
        assert!(system.contains("resume tailoring assistant"));
        assert!(system.ends_with(LATEX_ONLY_SYSTEM));
        assert!(prompt.contains(ORIGINAL));
        assert!(prompt.contains("Ran a Kubernetes cluster"));
        assert!(prompt.contains("Rust backend engineer"));
    }

    #[test]
    fn test_tailor_prompt_without_background() {
        let (_, prompt) = build_tailor_prompts(&session(None));
        assert!(prompt.contains(NO_BACKGROUND));
    }

    #[test]
    fn test_round_two() {
        assert_eq!(round_two(0.9249), 0.92);
        assert_eq!(round_two(0.876), 0.88);
    }

    #[tokio::test]
    async fn test_report_for_accepted_first_draft() {
        let llm = ReplyQueue::new(vec![
            "```latex\n\\documentclass{article}\n\\begin{document}\nNew\n\\end{document}\n```",
        ]);
        let renderer = FixedRenderer(1, Some(0.9234));
        let report = tailor_resume(&session(None), &llm, &renderer, &OptimizerConfig::default())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.original_filename, "jane.tex");
        assert_eq!(
            report.tailored_resume,
            "\\documentclass{article}\n\\begin{document}\nNew\n\\end{document}"
        );
        assert_eq!(report.page_count, 1);
        assert_eq!(report.fill_ratio, Some(0.92));
        assert!(!report.was_adjusted);
        assert_eq!(report.adjustment_type, None);
        assert!(report.converged);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.compiled_pdf_url.as_deref(), Some("/compiled/jane.pdf"));
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.history[0].fill_ratio, Some(0.9234));
    }

    #[tokio::test]
    async fn test_body_only_draft_gets_original_preamble() {
        let llm = ReplyQueue::new(vec!["\\begin{document}\nNew\n\\end{document}"]);
        let renderer = FixedRenderer(1, Some(0.9));
        let report = tailor_resume(&session(None), &llm, &renderer, &OptimizerConfig::default())
            .await
            .unwrap();
        assert!(report.tailored_resume.starts_with("\\documentclass{article}\n\\usepackage{geometry}\n"));
    }

    #[tokio::test]
    async fn test_report_for_exhausted_run() {
        let llm = ReplyQueue::new(vec![
            "\\documentclass{article}\\begin{document}Long\\end{document}",
        ]);
        let renderer = FixedRenderer(2, None);
        let report = tailor_resume(&session(None), &llm, &renderer, &OptimizerConfig::default())
            .await
            .unwrap();

        assert!(!report.converged);
        assert!(report.was_adjusted);
        assert_eq!(report.adjustment_count, 5);
        assert_eq!(report.adjustment_type, Some(AdjustmentDirection::Shortened));
        assert_eq!(report.page_count, 2);
        assert_eq!(report.fill_ratio, None);
        // one tailoring call plus five corrections
        assert_eq!(llm.prompts.lock().unwrap().len(), 6);

        // five corrected drafts plus the first one were all measured
        assert_eq!(report.history.len(), 6);
        assert!(report.history.iter().all(|r| r.page_count == 2));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["adjustment_type"], "shortened");
        assert!(json["fill_ratio"].is_null());
        assert_eq!(json["history"][0]["verdict"]["kind"], "overflow");
        assert_eq!(json["history"][5]["attempt"], 5);
    }

    #[tokio::test]
    async fn test_unusable_first_draft_fails() {
        let llm = ReplyQueue::new(vec!["I can't do that."]);
        let renderer = FixedRenderer(1, Some(0.9));
        let err = tailor_resume(&session(None), &llm, &renderer, &OptimizerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }
}
