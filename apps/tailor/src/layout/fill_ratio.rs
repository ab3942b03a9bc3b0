//! Fill Ratio — measures how much of a rendered page's usable height is occupied.
//!
//! # Measurement
//! The first page's text is walked with `pdf_extract`, one `ContentBlock` per
//! printed line. Given the minimum block top and the maximum block bottom:
//!
//! ```text
//! usable_height = page_height - bottom_margin - min_top
//! content_used  = max_bottom - min_top
//! fill_ratio    = clamp(content_used / usable_height, 0, 1)
//! ```
//!
//! The top margin is taken from where content actually starts, so the ratio answers
//! "how far down the page does the content reach". The bottom margin is a tunable
//! estimate, not derived from the document template.
//!
//! # Failure policy
//! Measurement never fails. An empty page yields `empty_page_ratio`; an unreadable
//! artifact (or a panic inside the PDF parser) yields `failed_measurement_ratio`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// Glyph box as a fraction of the em size, measured from the baseline.
const ASCENT_EM: f64 = 0.8;
const DESCENT_EM: f64 = 0.2;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Tunables for the fill measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Nominal bottom margin in points (~0.5 inch).
    pub bottom_margin_pt: f64,
    /// Returned when the page carries no text at all.
    pub empty_page_ratio: f64,
    /// Returned when the artifact cannot be measured.
    pub failed_measurement_ratio: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bottom_margin_pt: 36.0,
            empty_page_ratio: 0.5,
            failed_measurement_ratio: 0.9,
        }
    }
}

/// Vertical extent of one content block, in points from the top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub top: f64,
    pub bottom: f64,
}

/// Geometry of a single page: its height and every content block on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_height: f64,
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_extract::Error),

    #[error("text extraction failed: {0}")]
    Extraction(#[from] OutputError),

    #[error("document has no pages")]
    NoPages,
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Computes the fill ratio of a page from its geometry. Pure; always in `[0, 1]`.
pub fn compute_fill_ratio(geometry: &PageGeometry, config: &AnalyzerConfig) -> f64 {
    if geometry.blocks.is_empty() {
        return config.empty_page_ratio;
    }

    let (content_top, content_bottom) = geometry.blocks.iter().fold(
        (geometry.page_height, 0.0_f64),
        |(top, bottom), block| (top.min(block.top), bottom.max(block.bottom)),
    );

    let top_margin = content_top;
    let usable_height = geometry.page_height - config.bottom_margin_pt - top_margin;
    let content_used = content_bottom - top_margin;

    let ratio = if usable_height > 0.0 {
        content_used / usable_height
    } else {
        config.failed_measurement_ratio
    };

    debug!(
        content_top,
        content_bottom,
        page_height = geometry.page_height,
        usable_height,
        ratio,
        "fill ratio measured"
    );

    if ratio.is_nan() {
        return config.failed_measurement_ratio;
    }
    ratio.clamp(0.0, 1.0)
}

/// Measures the first page of the PDF at `path`. Never fails.
///
/// CPU-bound: call from `spawn_blocking`.
pub fn analyze_pdf(path: &Path, config: &AnalyzerConfig) -> f64 {
    let measured = catch_unwind(AssertUnwindSafe(|| first_page_geometry(path)));

    match measured {
        Ok(Ok(geometry)) => compute_fill_ratio(&geometry, config),
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "fill measurement failed, assuming acceptable");
            config.failed_measurement_ratio
        }
        Err(_) => {
            warn!(path = %path.display(), "PDF parser panicked during fill measurement");
            config.failed_measurement_ratio
        }
    }
}

/// Extracts the line-level content geometry of the first page.
pub fn first_page_geometry(path: &Path) -> Result<PageGeometry, LayoutError> {
    let doc = pdf_extract::Document::load(path)?;
    let first_page = *doc.get_pages().keys().next().ok_or(LayoutError::NoPages)?;

    let mut collector = LineCollector::default();
    pdf_extract::output_doc_page(&doc, &mut collector, first_page)?;
    collector.close_line();

    Ok(PageGeometry {
        page_height: collector.page_height,
        blocks: collector.blocks,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// pdf_extract output device
// ────────────────────────────────────────────────────────────────────────────

/// Accumulates glyph boxes into one block per printed line.
#[derive(Default)]
struct LineCollector {
    page_top: f64,
    page_height: f64,
    current: Option<ContentBlock>,
    last_baseline: Option<f64>,
    blocks: Vec<ContentBlock>,
}

impl LineCollector {
    fn close_line(&mut self) {
        if let Some(block) = self.current.take() {
            self.blocks.push(block);
        }
        self.last_baseline = None;
    }

    fn push_glyph(&mut self, baseline: f64, em: f64) {
        let glyph = ContentBlock {
            top: baseline - em * ASCENT_EM,
            bottom: baseline + em * DESCENT_EM,
        };
        if !glyph.top.is_finite() || !glyph.bottom.is_finite() {
            return;
        }

        // A baseline jump larger than half an em starts a new line.
        if let Some(last) = self.last_baseline {
            if (baseline - last).abs() > em * 0.5 {
                self.close_line();
            }
        }

        self.current = Some(match self.current {
            Some(block) => ContentBlock {
                top: block.top.min(glyph.top),
                bottom: block.bottom.max(glyph.bottom),
            },
            None => glyph,
        });
        self.last_baseline = Some(baseline);
    }
}

impl OutputDev for LineCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.page_top = media_box.ury;
        self.page_height = media_box.ury - media_box.lly;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.close_line();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        _width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> Result<(), OutputError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        // PDF space grows upwards; flip to distance from the top edge.
        let baseline = self.page_top - trm.m32;
        let scale = (trm.m11 * trm.m22 - trm.m12 * trm.m21).abs().sqrt();
        self.push_glyph(baseline, font_size * scale);
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        self.close_line();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
