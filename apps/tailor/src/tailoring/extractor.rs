//! Content Extraction — recovers a compilable LaTeX document from a free-form reply.
//!
//! The generative service has no output contract. Replies arrive wrapped in
//! markdown fences, prefixed with commentary, followed by explanations, or with
//! the preamble missing altogether. Each step below is a heuristic with a fallback:
//!
//! 1. Unwrap code fences, trying progressively looser patterns and keeping the
//!    first fenced block that carries a structural marker. No such block → raw reply.
//! 2. `\documentclass` present → drop everything before it.
//! 3. Only `\begin{document}` present → body-only reply; the caller's reference
//!    preamble is spliced in front (or the body is kept alone if there is none).
//! 4. Drop everything after the first `\end{document}`.
//! 5. Neither marker present → `ExtractionError`.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

pub const DOCUMENT_CLASS: &str = "\\documentclass";
pub const BEGIN_DOCUMENT: &str = "\\begin{document}";

const PREVIEW_CHARS: usize = 500;

/// Fence patterns, strictest first.
static FENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)```latex\s*\n(.*?)```",
        r"(?is)```tex\s*\n(.*?)```",
        r"(?s)```\s*\n(.*?)```",
        r"(?s)```(.*?)```",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("fence pattern is valid"))
    .collect()
});

static END_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\\end\{document\}").expect("end marker pattern is valid"));

#[derive(Debug, Error)]
#[error(
    "Could not extract valid LaTeX from API response. \
     The model may not have returned proper LaTeX code."
)]
pub struct ExtractionError {
    /// First characters of the offending reply, for diagnostics.
    pub preview: String,
}

/// Header portion (everything before `\begin{document}`) of the user's original
/// document. Extracted once per run and never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePreamble(String);

impl ReferencePreamble {
    pub fn from_source(source: &str) -> Self {
        match source.find(BEGIN_DOCUMENT) {
            Some(idx) => Self(source[..idx].to_string()),
            None => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a reply turned out to contain, before any preamble recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyShape {
    /// Full document starting at `\documentclass`.
    Document(String),
    /// Starts at `\begin{document}`; needs a preamble spliced in front.
    NeedsPreamble(String),
    /// No structural marker anywhere.
    Unrecoverable,
}

/// Classifies a raw reply (steps 1, 2, 4).
pub fn classify_reply(raw_reply: &str) -> ReplyShape {
    let text = unwrap_fences(raw_reply.trim());

    if let Some(start) = text.find(DOCUMENT_CLASS) {
        ReplyShape::Document(truncate_after_end(&text[start..]).to_string())
    } else if let Some(start) = text.find(BEGIN_DOCUMENT) {
        ReplyShape::NeedsPreamble(truncate_after_end(&text[start..]).to_string())
    } else {
        ReplyShape::Unrecoverable
    }
}

/// Recovers the document source from `raw_reply`, falling back to `preamble`
/// when the reply only carries a body.
pub fn extract_document(
    raw_reply: &str,
    preamble: &ReferencePreamble,
) -> Result<String, ExtractionError> {
    match classify_reply(raw_reply) {
        ReplyShape::Document(document) => Ok(document),
        ReplyShape::NeedsPreamble(body) => {
            warn!("Response missing preamble, using original resume's preamble");
            if preamble.is_empty() {
                Ok(body)
            } else {
                Ok(format!("{}{}", preamble.as_str(), body))
            }
        }
        ReplyShape::Unrecoverable => {
            let preview: String = raw_reply.chars().take(PREVIEW_CHARS).collect();
            warn!(preview = %preview, "Could not extract valid LaTeX from reply");
            Err(ExtractionError { preview })
        }
    }
}

fn has_marker(text: &str) -> bool {
    text.contains(DOCUMENT_CLASS) || text.contains(BEGIN_DOCUMENT)
}

fn unwrap_fences(text: &str) -> &str {
    FENCE_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|inner| has_marker(inner))
        .unwrap_or(text)
}

fn truncate_after_end(text: &str) -> &str {
    match END_DOCUMENT.find(text) {
        Some(m) => &text[..m.end()],
        None => text,
    }
}
