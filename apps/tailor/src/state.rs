use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::TextGenerator;
use crate::render::DocumentRenderer;
use crate::storage::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Chat-completions client. Swapped for a scripted fake in tests.
    pub llm: Arc<dyn TextGenerator>,
    /// LaTeX compiler + layout analyzer.
    pub renderer: Arc<dyn DocumentRenderer>,
    pub store: ResumeStore,
}
