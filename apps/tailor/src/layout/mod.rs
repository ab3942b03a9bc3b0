// Layout measurement: fill ratio of a rendered page, and the verdict derived from it.
// PDF parsing is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod fill_ratio;
pub mod page_fill;

// Re-export the public API consumed by other modules (render, optimizer).
pub use fill_ratio::{analyze_pdf, AnalyzerConfig};
pub use page_fill::{evaluate_page_fill, Correction, FillBounds, PageFillVerdict};
