//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to follow a run
//! as it moves from extraction through the two completion passes.
//!
//! # Why callbacks instead of channels?
//!
//! The host decides how progress is shown: a terminal spinner, a web
//! status line, a log record. The library only reports what happened.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_insight::{AnalysisConfig, AnalysisProgressCallback, Pass};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_pass_start(&self, pass: Pass) {
//!         eprintln!("{} started", pass);
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The two completion passes of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Structured data extraction from the document text.
    Extraction,
    /// Interpretation of the extraction (or raw text) plus images.
    Synthesis,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Extraction => f.write_str("Pass 1 (extraction)"),
            Pass::Synthesis => f.write_str("Pass 2 (synthesis)"),
        }
    }
}

/// Called by the pipeline as an analysis progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called before the PDF is opened.
    fn on_extraction_start(&self, source: &str) {
        let _ = source;
    }

    /// Called once text and images have been pulled from the PDF.
    fn on_extraction_complete(&self, page_count: usize, image_count: usize) {
        let _ = (page_count, image_count);
    }

    /// Called for each image reference that could not be recovered.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `reason`  : human-readable cause
    fn on_image_skipped(&self, page_num: usize, reason: &str) {
        let _ = (page_num, reason);
    }

    /// Called just before a completion request is sent (or served from cache).
    fn on_pass_start(&self, pass: Pass) {
        let _ = pass;
    }

    /// Called when a pass produced usable text.
    fn on_pass_complete(&self, pass: Pass, response_len: usize) {
        let _ = (pass, response_len);
    }

    /// Called when a pass failed. For [`Pass::Extraction`] the run continues
    /// on the raw document text.
    fn on_pass_failed(&self, pass: Pass, error: &str) {
        let _ = (pass, error);
    }

    /// Called once after the synthesis pass, whatever its outcome.
    fn on_analysis_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
