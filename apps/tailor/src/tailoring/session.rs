use std::path::Path;

use crate::tailoring::extractor::ReferencePreamble;

const DEFAULT_DOCUMENT_NAME: &str = "resume";

/// Everything one tailoring run needs, built fresh per request.
///
/// Nothing here is shared between runs; the optimization loop borrows it for
/// the lifetime of a single run.
#[derive(Debug, Clone)]
pub struct TailoringSession {
    /// Stem used for the compiled artifact (`<document_name>.pdf`).
    pub document_name: String,
    pub original_filename: String,
    pub original_source: String,
    pub reference_preamble: ReferencePreamble,
    pub job_description: String,
    pub background_context: Option<String>,
}

impl TailoringSession {
    pub fn new(
        original_filename: impl Into<String>,
        original_source: impl Into<String>,
        job_description: impl Into<String>,
        background_context: Option<String>,
    ) -> Self {
        let original_filename = original_filename.into();
        let original_source = original_source.into();
        let document_name = Path::new(&original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_NAME)
            .to_string();

        Self {
            document_name,
            reference_preamble: ReferencePreamble::from_source(&original_source),
            original_filename,
            original_source,
            job_description: job_description.into(),
            background_context: background_context.filter(|c| !c.trim().is_empty()),
        }
    }
}
