//! Page Fill Evaluation — turns a render measurement into a correction decision.
//!
//! # Rules
//! - More than one page → `Overflow` (hard constraint, fill ratio is not consulted)
//! - fill < min_fill     → `TooSparse`
//! - fill > max_fill     → `TooDense`
//! - otherwise           → `Acceptable` (both bounds inclusive)

use serde::{Deserialize, Serialize};

/// Acceptable fill band, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillBounds {
    pub min_fill: f64,
    pub max_fill: f64,
}

/// Overall page fill verdict for one render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageFillVerdict {
    /// One page, fill inside the band.
    Acceptable,
    /// One page with too much trailing whitespace.
    TooSparse { fill_ratio: f64 },
    /// One page, packed beyond the band.
    TooDense { fill_ratio: f64 },
    /// Spilled onto more than one page.
    Overflow { page_count: u32 },
}

/// Direction of a correction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    Shorten,
    Expand,
}

impl PageFillVerdict {
    /// The correction this verdict calls for, if any.
    pub fn correction(&self) -> Option<Correction> {
        match self {
            PageFillVerdict::Acceptable => None,
            PageFillVerdict::TooSparse { .. } => Some(Correction::Expand),
            PageFillVerdict::TooDense { .. } | PageFillVerdict::Overflow { .. } => {
                Some(Correction::Shorten)
            }
        }
    }
}

/// Classifies a render. A page count above one wins over any fill ratio.
///
/// A single-page render without a measurement is treated as acceptable; the
/// analyzer only withholds a ratio when it was never asked for one.
pub fn evaluate_page_fill(
    page_count: u32,
    fill_ratio: Option<f64>,
    bounds: &FillBounds,
) -> PageFillVerdict {
    if page_count > 1 {
        return PageFillVerdict::Overflow { page_count };
    }

    match fill_ratio {
        Some(fill_ratio) if fill_ratio < bounds.min_fill => {
            PageFillVerdict::TooSparse { fill_ratio }
        }
        Some(fill_ratio) if fill_ratio > bounds.max_fill => {
            PageFillVerdict::TooDense { fill_ratio }
        }
        _ => PageFillVerdict::Acceptable,
    }
}
