//! Correction Requests — asks the generative service to shorten or expand a document.
//!
//! Pure request formatting plus delegation: build the directional prompt, call the
//! service, hand the reply to the extractor. Errors from either step propagate as-is.

use tracing::debug;

use crate::errors::AppError;
use crate::layout::{Correction, FillBounds};
use crate::llm_client::prompts::{target_band, LATEX_ONLY_SYSTEM, STRUCTURE_INSTRUCTION};
use crate::llm_client::TextGenerator;
use crate::tailoring::extractor::{extract_document, ReferencePreamble};
use crate::tailoring::prompts::{
    fill_template, EXPAND_PROMPT_TEMPLATE, EXPAND_SYSTEM, SHORTEN_PROMPT_TEMPLATE, SHORTEN_SYSTEM,
};

/// Job description characters embedded in a correction prompt.
pub const JOB_DESCRIPTION_BUDGET: usize = 1500;

/// Everything a correction prompt needs to know about the current document.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionRequest<'a> {
    pub source: &'a str,
    pub preamble: &'a ReferencePreamble,
    pub job_description: &'a str,
    pub page_count: u32,
    pub fill_ratio: Option<f64>,
    pub bounds: FillBounds,
}

/// Asks for a ~5–10% cut and returns the extracted document.
pub async fn request_shorten(
    llm: &dyn TextGenerator,
    request: &CorrectionRequest<'_>,
) -> Result<String, AppError> {
    request_correction(llm, Correction::Shorten, request).await
}

/// Asks for ~10–15% more detail and returns the extracted document.
pub async fn request_expand(
    llm: &dyn TextGenerator,
    request: &CorrectionRequest<'_>,
) -> Result<String, AppError> {
    request_correction(llm, Correction::Expand, request).await
}

pub async fn request_correction(
    llm: &dyn TextGenerator,
    direction: Correction,
    request: &CorrectionRequest<'_>,
) -> Result<String, AppError> {
    let (system, prompt) = build_correction_prompts(direction, request);
    let raw_reply = llm.complete(&system, &prompt).await?;
    debug!(
        ?direction,
        preview = %raw_reply.chars().take(300).collect::<String>(),
        "correction reply received"
    );
    Ok(extract_document(&raw_reply, request.preamble)?)
}

/// Returns `(system_prompt, user_prompt)` for a correction round.
pub(crate) fn build_correction_prompts(
    direction: Correction,
    request: &CorrectionRequest<'_>,
) -> (String, String) {
    let status = describe_status(request.page_count, request.fill_ratio);
    let band = target_band(request.bounds.min_fill, request.bounds.max_fill);
    let job_description = truncate_chars(request.job_description, JOB_DESCRIPTION_BUDGET);

    let (system, template) = match direction {
        Correction::Shorten => (format!("{SHORTEN_SYSTEM}{LATEX_ONLY_SYSTEM}"), SHORTEN_PROMPT_TEMPLATE),
        Correction::Expand => (
            format!(
                "{}{LATEX_ONLY_SYSTEM}",
                fill_template(EXPAND_SYSTEM, &[("structure", STRUCTURE_INSTRUCTION)])
            ),
            EXPAND_PROMPT_TEMPLATE,
        ),
    };

    let prompt = fill_template(
        template,
        &[
            ("status", status.as_str()),
            ("target_band", band.as_str()),
            ("job_description", job_description),
            ("latex", request.source),
        ],
    );
    (system, prompt)
}

fn describe_status(page_count: u32, fill_ratio: Option<f64>) -> String {
    match fill_ratio {
        _ if page_count > 1 => {
            format!("It currently runs to {page_count} pages and must fit on exactly one.")
        }
        Some(ratio) => format!("Current fill ratio: {ratio:.2}"),
        None => "Current fill ratio: unknown".to_string(),
    }
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_client::LlmError;

    const DOC: &str = "\\documentclass{article}\n\\begin{document}\nShort\n\\end{document}";

    /// Replies with a fixed text and records every prompt it receives.
    struct ScriptedLlm {
        reply: Result<String, u16>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedLlm {
        async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::Api {
                    status: *status,
                    message: "upstream unavailable".to_string(),
                }),
            }
        }
    }

    fn request<'a>(preamble: &'a ReferencePreamble, jd: &'a str) -> CorrectionRequest<'a> {
        CorrectionRequest {
            source: DOC,
            preamble,
            job_description: jd,
            page_count: 1,
            fill_ratio: Some(0.97),
            bounds: FillBounds {
                min_fill: 0.88,
                max_fill: 0.96,
            },
        }
    }

    #[test]
    fn test_shorten_prompt_contents() {
        let preamble = ReferencePreamble::default();
        let (system, prompt) =
            build_correction_prompts(Correction::Shorten, &request(&preamble, "Rust engineer"));
        assert!(system.contains("shortened slightly"));
        assert!(system.ends_with(LATEX_ONLY_SYSTEM));
        assert!(prompt.contains("Current fill ratio: 0.97"));
        assert!(prompt.contains("0.88-0.96"));
        assert!(prompt.contains("5-10%"));
        assert!(prompt.contains("Rust engineer"));
        assert!(prompt.contains(DOC));
    }

    #[test]
    fn test_expand_prompt_contents() {
        let preamble = ReferencePreamble::default();
        let mut req = request(&preamble, "Go developer");
        req.fill_ratio = Some(0.71);
        let (system, prompt) = build_correction_prompts(Correction::Expand, &req);
        assert!(system.contains("too much whitespace"));
        assert!(system.contains("Keep 3 experiences, 2 projects structure"));
        assert!(prompt.contains("Current fill ratio: 0.71"));
        assert!(prompt.contains("10-15%"));
    }

    #[test]
    fn test_multi_page_status_mentions_page_count() {
        let preamble = ReferencePreamble::default();
        let mut req = request(&preamble, "jd");
        req.page_count = 2;
        req.fill_ratio = None;
        let (_, prompt) = build_correction_prompts(Correction::Shorten, &req);
        assert!(prompt.contains("runs to 2 pages"));
    }

    #[test]
    fn test_job_description_is_truncated_to_budget() {
        let preamble = ReferencePreamble::default();
        let jd = format!("{}{}", "a".repeat(JOB_DESCRIPTION_BUDGET), "TAIL_MARKER");
        let (_, prompt) = build_correction_prompts(Correction::Shorten, &request(&preamble, &jd));
        assert!(prompt.contains(&"a".repeat(JOB_DESCRIPTION_BUDGET)));
        assert!(!prompt.contains("TAIL_MARKER"));
    }

    #[test]
    fn test_truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_request_shorten_extracts_fenced_reply() {
        let llm = ScriptedLlm::replying(&format!("```latex\n{DOC}\n```\nHope this helps"));
        let preamble = ReferencePreamble::default();
        let out = request_shorten(&llm, &request(&preamble, "jd")).await.unwrap();
        assert_eq!(out, DOC);
        assert_eq!(llm.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_expand_uses_reference_preamble() {
        let llm = ScriptedLlm::replying("\\begin{document}\nMore\n\\end{document}");
        let preamble = ReferencePreamble::from_source(DOC);
        let out = request_expand(&llm, &request(&preamble, "jd")).await.unwrap();
        assert_eq!(
            out,
            "\\documentclass{article}\n\\begin{document}\nMore\n\\end{document}"
        );
    }

    #[tokio::test]
    async fn test_unusable_reply_is_extraction_error() {
        let llm = ScriptedLlm::replying("I cannot do that.");
        let preamble = ReferencePreamble::default();
        let err = request_shorten(&llm, &request(&preamble, "jd")).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let llm = ScriptedLlm::failing(503);
        let preamble = ReferencePreamble::default();
        let err = request_expand(&llm, &request(&preamble, "jd")).await.unwrap_err();
        assert!(
            matches!(err, AppError::Llm(LlmError::Api { status: 503, .. })),
            "got {err:?}"
        );
    }
}
