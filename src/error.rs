//! Error types for the edgequake-pdf-insight library.
//!
//! Failures fall into three groups, each with its own type:
//!
//! * [`ExtractionError`]: **Fatal to parsing**: the PDF could not be read at
//!   all. No partial document is ever returned alongside it.
//!
//! * [`CompletionError`]: a single completion-service call failed. The
//!   orchestrator absorbs it during the structured-extraction pass and turns
//!   it into [`AnalysisError::SynthesisFailed`] during the synthesis pass.
//!
//! * [`AnalysisError`]: **Fatal to analysis**: there is nothing to analyse,
//!   or the synthesis pass produced no output.
//!
//! [`InsightError`] is what the top-level `analyze_report*` entry points
//! return; it wraps the two fatal kinds above together with host-side
//! failures (download, provider setup, writing the report).

use std::path::PathBuf;
use thiserror::Error;

/// Document-level extraction failure. Always terminal, never retried.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No file at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// The file exists but has zero bytes.
    #[error("PDF file is empty (0 bytes): '{path}'")]
    Empty { path: PathBuf },

    /// The PDF reader rejected the file.
    #[error("Could not parse PDF '{path}': {detail}")]
    MalformedDocument { path: PathBuf, detail: String },

    /// Permission or filesystem problem while reading the file.
    #[error("File I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else, e.g. the extraction task panicked.
    #[error("Unexpected error while parsing PDF: {0}")]
    Unknown(String),
}

/// A single completion-service call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The model answered with no text.
    #[error("completion service returned no content")]
    EmptyResponse,

    /// The provider call itself failed (network, auth, content filter, …).
    #[error("completion provider error: {message}")]
    Provider { message: String },

    /// None of the supplied images could be prepared for the request.
    #[error("no image could be prepared for the multimodal request")]
    NoUsableImages,

    /// An image could not be re-encoded for transport.
    #[error("image encoding failed: {detail}")]
    Encoding { detail: String },
}

/// Fatal analysis failure.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The document had neither text nor images.
    #[error("PDF contained no extractable text or images")]
    NothingToAnalyze,

    /// The synthesis pass produced no output; there is no fallback for it.
    #[error("Failed to generate the final analysis: {source}")]
    SynthesisFailed {
        #[source]
        source: CompletionError,
    },
}

/// All fatal errors returned by the top-level entry points.
#[derive(Debug, Error)]
pub enum InsightError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input string is neither a path nor an HTTP(S) URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Parsing the PDF failed.
    #[error("Failed to parse the PDF file: {0}")]
    Extraction(#[from] ExtractionError),

    /// Analysing the extracted content failed.
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InsightError {
    /// True when the run failed while parsing rather than analysing.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, InsightError::Extraction(_))
    }
}
