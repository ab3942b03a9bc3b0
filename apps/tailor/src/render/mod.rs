//! Renderer — compiles LaTeX source to a fixed-size PDF and measures it.
//!
//! # Lifecycle
//! Every call owns a fresh `TempDir` workspace. The source is written there, the
//! compiler runs with the workspace as its working directory, and the directory
//! is removed when the `TempDir` drops, on every exit path including timeout.
//!
//! # Persistence
//! `RenderTarget::Scratch` leaves nothing behind. `RenderTarget::Durable` copies the
//! PDF to `<output_dir>/<name>.pdf` through a temp file in the same directory and an
//! atomic rename, so concurrent runs for the same name are last-writer-wins and
//! readers never observe a partial file.
//!
//! No retries happen here; retry policy belongs to the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::layout::{analyze_pdf, AnalyzerConfig};

const ERROR_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(
        "LaTeX compiler '{binary}' could not be started ({source}). Install a LaTeX \
         distribution (e.g. TeX Live or MiKTeX) and make sure it is on your PATH."
    )]
    CompilerUnavailable {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LaTeX compilation failed: {0}")]
    Rejected(String),

    #[error("LaTeX compilation timed out after {0}s")]
    TimedOut(u64),

    #[error("LaTeX compilation did not produce a PDF file")]
    MissingArtifact,

    #[error("invalid document name: '{0}'")]
    InvalidName(String),

    #[error("rendered PDF could not be read: {0}")]
    Unreadable(String),

    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a render's artifact ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Throwaway workspace only; used while searching.
    Scratch,
    /// Copied to the durable output directory; used once, after the terminal decision.
    Durable,
}

/// Outcome of one successful render.
///
/// `fill_ratio` is only measured for single-page output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderResult {
    pub page_count: u32,
    pub fill_ratio: Option<f64>,
    pub artifact_path: Option<PathBuf>,
}

/// Seam between the optimization loop and the compiler.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        source: &str,
        document_name: &str,
        target: RenderTarget,
    ) -> Result<RenderResult, RenderError>;
}

/// `pdflatex`-backed renderer.
#[derive(Debug, Clone)]
pub struct LatexRenderer {
    binary: String,
    timeout: Duration,
    output_dir: PathBuf,
    analyzer: AnalyzerConfig,
}

impl LatexRenderer {
    pub fn new(
        binary: impl Into<String>,
        timeout: Duration,
        output_dir: impl Into<PathBuf>,
        analyzer: AnalyzerConfig,
    ) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            output_dir: output_dir.into(),
            analyzer,
        }
    }

    /// Runs the compiler inside `workspace` and returns the produced PDF path.
    async fn compile(&self, workspace: &Path, document_name: &str) -> Result<PathBuf, RenderError> {
        let tex_name = format!("{document_name}.tex");

        let mut command = Command::new(&self.binary);
        command
            .arg("-interaction=nonstopmode")
            .arg(&tex_name)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => return Err(RenderError::TimedOut(self.timeout.as_secs())),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::CompilerUnavailable {
                    binary: self.binary.clone(),
                    source: e,
                })
            }
            Ok(Err(e)) => return Err(RenderError::Io(e)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let log = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(RenderError::Rejected(error_excerpt(&log)));
        }

        let pdf_path = workspace.join(format!("{document_name}.pdf"));
        if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
            return Err(RenderError::MissingArtifact);
        }
        Ok(pdf_path)
    }
}

#[async_trait]
impl DocumentRenderer for LatexRenderer {
    async fn render(
        &self,
        source: &str,
        document_name: &str,
        target: RenderTarget,
    ) -> Result<RenderResult, RenderError> {
        validate_document_name(document_name)?;

        // Dropped (and removed) on every return below.
        let workspace = tempfile::tempdir()?;
        tokio::fs::write(workspace.path().join(format!("{document_name}.tex")), source).await?;

        let pdf_path = self.compile(workspace.path(), document_name).await?;

        // CPU-bound PDF parsing — spawn_blocking to avoid blocking the async executor.
        let measure_path = pdf_path.clone();
        let analyzer = self.analyzer;
        let (page_count, fill_ratio) = tokio::task::spawn_blocking(move || {
            let page_count = count_pages(&measure_path)?;
            let fill_ratio = (page_count == 1).then(|| analyze_pdf(&measure_path, &analyzer));
            Ok::<_, RenderError>((page_count, fill_ratio))
        })
        .await
        .map_err(|e| RenderError::Unreadable(format!("measurement task failed: {e}")))??;

        debug!(document_name, page_count, ?fill_ratio, "render measured");

        let artifact_path = match target {
            RenderTarget::Scratch => None,
            RenderTarget::Durable => {
                let output_dir = self.output_dir.clone();
                let file_name = format!("{document_name}.pdf");
                let final_path = tokio::task::spawn_blocking(move || {
                    persist_artifact(&pdf_path, &output_dir, &file_name)
                })
                .await
                .map_err(|e| RenderError::Unreadable(format!("persist task failed: {e}")))??;
                info!(path = %final_path.display(), "compiled PDF saved");
                Some(final_path)
            }
        };

        Ok(RenderResult {
            page_count,
            fill_ratio,
            artifact_path,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn validate_document_name(name: &str) -> Result<(), RenderError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(RenderError::InvalidName(name.to_string()))
    }
}

fn count_pages(path: &Path) -> Result<u32, RenderError> {
    let doc = pdf_extract::Document::load(path).map_err(|e| RenderError::Unreadable(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Copies `pdf_path` to `output_dir/file_name`, replacing any previous artifact atomically.
fn persist_artifact(pdf_path: &Path, output_dir: &Path, file_name: &str) -> Result<PathBuf, RenderError> {
    std::fs::create_dir_all(output_dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(output_dir)?;
    let mut source = std::fs::File::open(pdf_path)?;
    std::io::copy(&mut source, staged.as_file_mut())?;

    let final_path = output_dir.join(file_name);
    staged.persist(&final_path).map_err(|e| RenderError::Io(e.error))?;
    Ok(final_path)
}

/// Picks the useful part of a compiler log: from the first `!` error line if
/// there is one, otherwise the start of the log.
fn error_excerpt(log: &str) -> String {
    let trimmed = log.trim();
    let start = trimmed
        .lines()
        .find(|l| l.starts_with('!'))
        .and_then(|l| trimmed.find(l))
        .unwrap_or(0);
    let excerpt: String = trimmed[start..].chars().take(ERROR_EXCERPT_CHARS).collect();
    if excerpt.is_empty() {
        "Unknown LaTeX compilation error".to_string()
    } else {
        excerpt
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
