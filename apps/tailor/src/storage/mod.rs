//! File-backed persistence rooted at `DATA_DIR`.
//!
//! Layout:
//! ```text
//! <root>/current.tex          working document
//! <root>/current.json         metadata for the working document
//! <root>/context.txt          background context (missing ⇒ empty)
//! <root>/uploads/<name>.tex   raw uploads, as received
//! <root>/compiled/<name>.pdf  durable render artifacts
//! <root>/compiled/<name>.tex  tailored source for the artifact beside it
//! ```
//! The working document is read from disk on every request; nothing is cached
//! in process memory.

pub mod handlers;

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const CURRENT_SOURCE: &str = "current.tex";
const CURRENT_METADATA: &str = "current.json";
const CONTEXT_FILE: &str = "context.txt";
const UPLOADS_DIR: &str = "uploads";
const COMPILED_DIR: &str = "compiled";
const TEX_EXTENSION: &str = "tex";
const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid filename: '{0}'")]
    InvalidFilename(String),

    #[error("Only LaTeX (.tex) resumes are supported (got '{0}')")]
    UnsupportedFileType(String),

    #[error("file exceeds the {max_bytes} byte upload limit")]
    TooLarge { max_bytes: usize },

    #[error("file is not valid UTF-8 text")]
    NotUtf8,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResumeMetadata {
    filename: String,
    file_type: String,
    uploaded_at: DateTime<Utc>,
}

/// The working document plus what is known about where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResume {
    pub filename: String,
    pub file_type: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ResumeStore {
    root: PathBuf,
}

impl ResumeStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self { root: root.into() };
        tokio::fs::create_dir_all(store.root.join(UPLOADS_DIR)).await?;
        tokio::fs::create_dir_all(store.compiled_dir()).await?;
        info!(root = %store.root.display(), "resume store ready");
        Ok(store)
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compiled_dir(&self) -> PathBuf {
        self.root.join(COMPILED_DIR)
    }

    /// Validates an uploaded `.tex` file and makes it the working document.
    pub async fn save_upload(
        &self,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<StoredResume, StorageError> {
        let filename = sanitize_filename(original_filename)?;
        if !has_extension(&filename, TEX_EXTENSION) {
            return Err(StorageError::UnsupportedFileType(filename));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(StorageError::TooLarge {
                max_bytes: MAX_UPLOAD_BYTES,
            });
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| StorageError::NotUtf8)?
            .to_string();

        tokio::fs::write(self.root.join(UPLOADS_DIR).join(&filename), bytes).await?;

        let metadata = ResumeMetadata {
            filename: filename.clone(),
            file_type: TEX_EXTENSION.to_string(),
            uploaded_at: Utc::now(),
        };
        write_atomic(&self.root, CURRENT_SOURCE, content.clone().into_bytes()).await?;
        write_atomic(&self.root, CURRENT_METADATA, serde_json::to_vec_pretty(&metadata)?).await?;

        info!(filename = %filename, bytes = bytes.len(), "working document replaced");
        Ok(StoredResume {
            filename,
            file_type: metadata.file_type,
            uploaded_at: Some(metadata.uploaded_at),
            content,
        })
    }

    /// Loads the working document, if one has ever been uploaded.
    pub async fn current_resume(&self) -> Result<Option<StoredResume>, StorageError> {
        let content = match tokio::fs::read_to_string(self.root.join(CURRENT_SOURCE)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.is_empty() {
            return Ok(None);
        }

        let metadata = match tokio::fs::read(self.root.join(CURRENT_METADATA)).await {
            Ok(raw) => match serde_json::from_slice::<ResumeMetadata>(&raw) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(error = %e, "working document metadata is corrupt; ignoring it");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Some(match metadata {
            Some(m) => StoredResume {
                filename: m.filename,
                file_type: m.file_type,
                uploaded_at: Some(m.uploaded_at),
                content,
            },
            None => StoredResume {
                filename: CURRENT_SOURCE.to_string(),
                file_type: TEX_EXTENSION.to_string(),
                uploaded_at: None,
                content,
            },
        }))
    }

    /// Background context text; empty when none has been saved.
    pub async fn load_context(&self) -> Result<String, StorageError> {
        match tokio::fs::read_to_string(self.root.join(CONTEXT_FILE)).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save_context(&self, text: &str) -> Result<(), StorageError> {
        write_atomic(&self.root, CONTEXT_FILE, text.as_bytes().to_vec()).await?;
        info!(chars = text.chars().count(), "background context updated");
        Ok(())
    }

    /// Writes the final tailored source as `compiled/<document_name>.tex`.
    pub async fn save_tailored_source(
        &self,
        document_name: &str,
        source: &str,
    ) -> Result<PathBuf, StorageError> {
        let filename = sanitize_filename(&format!("{document_name}.{TEX_EXTENSION}"))?;
        let dir = self.compiled_dir();
        write_atomic(&dir, &filename, source.as_bytes().to_vec()).await?;
        Ok(dir.join(filename))
    }

    /// Reads `compiled/<filename>`; `None` when it does not exist.
    pub async fn compiled_artifact(
        &self,
        filename: &str,
    ) -> Result<Option<(String, Vec<u8>)>, StorageError> {
        let safe = sanitize_filename(filename)?;
        if safe != filename || !has_extension(&safe, PDF_EXTENSION) {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }
        match tokio::fs::read(self.compiled_dir().join(&safe)).await {
            Ok(bytes) => Ok(Some((safe, bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduces an untrusted filename to `[A-Za-z0-9._-]`.
///
/// Directory components are dropped, whitespace becomes `_`, leading dots and
/// underscores are stripped. An empty result is rejected.
pub fn sanitize_filename(raw: &str) -> Result<String, StorageError> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(StorageError::InvalidFilename(raw.to_string()));
    }
    Ok(cleaned)
}

fn has_extension(filename: &str, extension: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Stages `bytes` in a temp file inside `dir`, then renames it over `dir/name`.
async fn write_atomic(dir: &Path, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
    let dir = dir.to_path_buf();
    let target = dir.join(name);
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut staged = NamedTempFile::new_in(&dir)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEX: &str = "\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}";

    async fn store() -> (tempfile::TempDir, ResumeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path().join("data")).await.unwrap();
        (dir, store)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Resume.tex").unwrap(), "My_Resume.tex");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.tex").unwrap(), "cv.tex");
        assert_eq!(sanitize_filename(".hidden.tex").unwrap(), "hidden.tex");
        assert_eq!(sanitize_filename("résumé.tex").unwrap(), "rsum.tex");
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("///").is_err());
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let (_dir, store) = store().await;
        assert!(store.root().join("uploads").is_dir());
        assert!(store.compiled_dir().is_dir());
    }

    #[tokio::test]
    async fn test_no_resume_before_upload() {
        let (_dir, store) = store().await;
        assert!(store.current_resume().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_becomes_working_document() {
        let (_dir, store) = store().await;
        let saved = store.save_upload("jane doe.tex", TEX.as_bytes()).await.unwrap();
        assert_eq!(saved.filename, "jane_doe.tex");
        assert!(store.root().join("uploads/jane_doe.tex").is_file());

        let current = store.current_resume().await.unwrap().unwrap();
        assert_eq!(current.content, TEX);
        assert_eq!(current.filename, "jane_doe.tex");
        assert_eq!(current.file_type, "tex");
        assert!(current.uploaded_at.is_some());
    }

    #[tokio::test]
    async fn test_working_document_survives_reopen() {
        let (dir, store) = store().await;
        store.save_upload("cv.tex", TEX.as_bytes()).await.unwrap();
        drop(store);

        let reopened = ResumeStore::open(dir.path().join("data")).await.unwrap();
        assert_eq!(reopened.current_resume().await.unwrap().unwrap().content, TEX);
    }

    #[tokio::test]
    async fn test_missing_metadata_falls_back() {
        let (_dir, store) = store().await;
        tokio::fs::write(store.root().join("current.tex"), TEX).await.unwrap();
        let current = store.current_resume().await.unwrap().unwrap();
        assert_eq!(current.filename, "current.tex");
        assert!(current.uploaded_at.is_none());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_tex() {
        let (_dir, store) = store().await;
        let err = store.save_upload("cv.pdf", b"%PDF").await.unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedFileType(_)));
        assert!(store.current_resume().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_accepts_uppercase_extension() {
        let (_dir, store) = store().await;
        assert!(store.save_upload("CV.TEX", TEX.as_bytes()).await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_and_binary() {
        let (_dir, store) = store().await;
        let big = vec![b'a'; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            store.save_upload("cv.tex", &big).await.unwrap_err(),
            StorageError::TooLarge { .. }
        ));
        assert!(matches!(
            store.save_upload("cv.tex", &[0xff, 0xfe, 0x00]).await.unwrap_err(),
            StorageError::NotUtf8
        ));
    }

    #[tokio::test]
    async fn test_context_round_trip_and_default() {
        let (_dir, store) = store().await;
        assert_eq!(store.load_context().await.unwrap(), "");
        store.save_context("Led a Rust migration at Acme.").await.unwrap();
        assert_eq!(store.load_context().await.unwrap(), "Led a Rust migration at Acme.");
        store.save_context("").await.unwrap();
        assert_eq!(store.load_context().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_tailored_source_written_next_to_artifacts() {
        let (_dir, store) = store().await;
        let path = store.save_tailored_source("jane", TEX).await.unwrap();
        assert_eq!(path, store.compiled_dir().join("jane.tex"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), TEX);
        // last writer wins
        store.save_tailored_source("jane", "v2").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_compiled_artifact_lookup() {
        let (_dir, store) = store().await;
        assert!(store.compiled_artifact("jane.pdf").await.unwrap().is_none());

        tokio::fs::write(store.compiled_dir().join("jane.pdf"), b"%PDF-1.5")
            .await
            .unwrap();
        let (name, bytes) = store.compiled_artifact("jane.pdf").await.unwrap().unwrap();
        assert_eq!(name, "jane.pdf");
        assert_eq!(bytes, b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_compiled_artifact_rejects_traversal_and_non_pdf() {
        let (_dir, store) = store().await;
        assert!(store.compiled_artifact("../current.tex").await.is_err());
        assert!(store.compiled_artifact("jane.tex").await.is_err());
    }
}
