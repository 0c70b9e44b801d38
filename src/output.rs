//! Result types produced by the analyzer and the top-level entry points.

use crate::document::DocumentSummary;
use crate::error::CompletionError;
use crate::pipeline::postprocess;
use serde::{Deserialize, Serialize};

/// Outcome of one completion pass.
///
/// The orchestrator matches on this to pick the synthesis basis, instead of
/// testing optional strings for emptiness at each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The service answered with non-blank text.
    Success(String),
    /// The call failed or came back blank.
    Failed(CompletionError),
}

impl PassOutcome {
    /// Classify a raw service response; blank text counts as a failure.
    pub fn from_response(response: Result<String, CompletionError>) -> Self {
        match response {
            Ok(text) if !text.trim().is_empty() => PassOutcome::Success(text),
            Ok(_) => PassOutcome::Failed(CompletionError::EmptyResponse),
            Err(e) => PassOutcome::Failed(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PassOutcome::Success(_))
    }
}

/// Output of a successful analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Structured extraction from pass 1; absent when that pass failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_extraction: Option<String>,
    /// Synthesis from pass 2.
    pub final_analysis: String,
}

/// Timings and counters for one [`AnalysisReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub extraction_ms: u64,
    pub analysis_ms: u64,
    pub total_ms: u64,
    /// Completion calls answered from the cache during this run.
    pub cache_hits: usize,
}

/// Everything the host needs to display one analysed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The path or URL the user supplied.
    pub source: String,
    pub document: DocumentSummary,
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}

/// Shown with every rendered report.
pub const DISCLAIMER: &str = "**Disclaimer:** This analysis is for informational purposes ONLY and is \
NOT a substitute for professional medical advice, diagnosis, or treatment. The AI may make \
mistakes or misinterpret information. Always discuss these findings with your doctor.";

impl AnalysisReport {
    /// Render the report as a Markdown document.
    ///
    /// `include_extraction` controls whether the pass-1 extraction (when
    /// present) is shown ahead of the interpretation.
    pub fn to_markdown(&self, include_extraction: bool) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Report Analysis: {}\n\n", self.source));
        md.push_str(&format!(
            "_{} pages, {} images analysed_\n\n",
            self.document.page_count, self.document.image_count
        ));

        if include_extraction {
            if let Some(ref extraction) = self.result.initial_extraction {
                md.push_str("## Initial Data Extraction & Text Summary\n\n");
                md.push_str(postprocess::clean_markdown(extraction).trim_end());
                md.push_str("\n\n---\n\n");
            }
        }

        md.push_str("## Overall Interpretation & Suggestions\n\n");
        md.push_str(postprocess::clean_markdown(&self.result.final_analysis).trim_end());
        md.push_str("\n\n---\n\n");
        md.push_str(DISCLAIMER);
        md.push('\n');
        md
    }
}
