//! # edgequake-pdf-insight
//!
//! Read a medical or laboratory report PDF and produce a plain-language,
//! non-diagnostic interpretation with a vision-capable LLM.
//!
//! ## Why two passes?
//!
//! Reports mix tables of numbers, reference ranges and narrative findings,
//! often across several pages. Asking a model to interpret all of that in one
//! go tends to skip values. The first pass only extracts: every measurement
//! with its unit and reference range, every narrative finding. The second
//! pass interprets that structured summary together with any images embedded
//! in the report (scans, charts). If the first pass fails the second one
//! still runs, on the raw text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, upload bytes or download from URL
//!  ├─ 2. Extract   page text + embedded images via lopdf (spawn_blocking)
//!  ├─ 3. Pass 1    structured extraction (text only)
//!  ├─ 4. Pass 2    synthesis (multimodal when images exist)
//!  └─ 5. Report    Markdown / JSON with a medical disclaimer
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_insight::{analyze_report, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / ANTHROPIC_API_KEY
//!     let config = AnalysisConfig::default();
//!     let report = analyze_report("blood-panel.pdf", &config).await?;
//!     println!("{}", report.to_markdown(false));
//!     Ok(())
//! }
//! ```
//!
//! ## Using the core directly
//!
//! [`Analyzer`] only needs an [`ExtractedDocument`] and something that
//! implements [`CompletionService`], which makes it easy to drive from a
//! test stub or a custom transport.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfinsight` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf-insight = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod cache;
pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::Analyzer;
pub use cache::{CacheKey, CompletionCache};
pub use completion::{CompletionMode, CompletionService};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use document::{
    DocumentSummary, ExtractedDocument, ExtractedImage, ImageEncoding, ImageWarning, PredictorParams,
};
pub use error::{AnalysisError, CompletionError, ExtractionError, InsightError};
pub use output::{AnalysisReport, AnalysisResult, AnalysisStats, PassOutcome, DISCLAIMER};
pub use pipeline::extract::{extract, extract_blocking};
pub use pipeline::llm::LlmCompletionService;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, Pass, ProgressCallback};
pub use run::{
    analyze_report, analyze_report_from_bytes, analyze_report_sync, analyze_report_to_file,
    clear_cache, inspect,
};
