//! Two-pass analysis of an extracted document.
//!
//! ## Pass 1: structured extraction (text only)
//!
//! The document text goes to the model with a request for sections, every
//! numeric measurement with unit and reference range, and a summary of
//! narrative findings. A failure here is absorbed: the synthesis pass then
//! works from the raw text instead.
//!
//! ## Pass 2: synthesis
//!
//! The pass-1 output (or the raw text) is embedded in the synthesis prompt.
//! When the document had images they are attached in page order and the
//! call is multimodal. A failure here ends the run; there is nothing left to
//! fall back to.
//!
//! The two passes run strictly in sequence and are never retried.

use crate::cache::{CacheKey, CompletionCache};
use crate::completion::CompletionService;
use crate::document::{ExtractedDocument, ExtractedImage};
use crate::error::AnalysisError;
use crate::output::{AnalysisResult, PassOutcome};
use crate::progress::{Pass, ProgressCallback};
use crate::prompts;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the two completion passes against a [`CompletionService`].
#[derive(Clone)]
pub struct Analyzer {
    service: Arc<dyn CompletionService>,
    cache: Option<Arc<CompletionCache>>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("service", &self.service.name())
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .field("progress", &self.progress.as_ref().map(|_| "<dyn AnalysisProgressCallback>"))
            .finish()
    }
}

impl Analyzer {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            cache: None,
            progress: None,
        }
    }

    /// Answer repeated requests from `cache` instead of the service.
    pub fn with_cache(mut self, cache: Arc<CompletionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Analyse `document`.
    ///
    /// # Errors
    /// - [`AnalysisError::NothingToAnalyze`] when the document has no text
    ///   and no images; the service is not called.
    /// - [`AnalysisError::SynthesisFailed`] when pass 2 fails or returns
    ///   blank text, whatever pass 1 did.
    pub async fn analyze(
        &self,
        document: &ExtractedDocument,
    ) -> Result<AnalysisResult, AnalysisError> {
        if document.is_empty() {
            warn!("PDF contained no extractable text or images");
            if let Some(ref cb) = self.progress {
                cb.on_analysis_complete(false);
            }
            return Err(AnalysisError::NothingToAnalyze);
        }

        let start = Instant::now();
        info!(
            "Analyzing report: {} chars of text, {} images",
            document.full_text().len(),
            document.images().len()
        );

        // ── Pass 1: structured extraction ────────────────────────────────
        let extraction_prompt = prompts::extraction_prompt(document.full_text());
        let initial_extraction = match self.run_pass(Pass::Extraction, &extraction_prompt, &[]).await {
            PassOutcome::Success(text) => Some(text),
            PassOutcome::Failed(e) => {
                warn!("{} ({})", prompts::FALLBACK_NOTICE, e);
                None
            }
        };

        // ── Pass 2: synthesis ────────────────────────────────────────────
        let basis = initial_extraction
            .as_deref()
            .unwrap_or_else(|| document.full_text());
        let synthesis_prompt = prompts::synthesis_prompt(basis);

        if document.images().is_empty() {
            info!("Synthesising from text only (no images found)");
        } else {
            info!("Synthesising text together with {} image(s)", document.images().len());
        }

        let outcome = self
            .run_pass(Pass::Synthesis, &synthesis_prompt, document.images())
            .await;

        let result = match outcome {
            PassOutcome::Success(final_analysis) => Ok(AnalysisResult {
                initial_extraction,
                final_analysis,
            }),
            PassOutcome::Failed(source) => Err(AnalysisError::SynthesisFailed { source }),
        };

        if let Some(ref cb) = self.progress {
            cb.on_analysis_complete(result.is_ok());
        }
        info!("Analysis finished in {:?}", start.elapsed());
        result
    }

    /// One completion call, served from the cache when possible.
    ///
    /// An empty `images` slice means a text-only call.
    async fn run_pass(&self, pass: Pass, prompt: &str, images: &[ExtractedImage]) -> PassOutcome {
        if let Some(ref cb) = self.progress {
            cb.on_pass_start(pass);
        }

        let key = CacheKey::multimodal(self.service.cache_namespace(), prompt, images);
        let cached = self.cache.as_ref().and_then(|c| c.get(&key));

        let outcome = match cached {
            Some(text) => {
                debug!("{}: answered from cache", pass);
                PassOutcome::Success(text)
            }
            None => {
                let response = if images.is_empty() {
                    self.service.complete_text(prompt).await
                } else {
                    self.service.complete_multimodal(prompt, images).await
                };
                let outcome = PassOutcome::from_response(response);
                if let (PassOutcome::Success(text), Some(cache)) = (&outcome, &self.cache) {
                    cache.insert(key, text.clone());
                }
                outcome
            }
        };

        match (&outcome, &self.progress) {
            (PassOutcome::Success(text), Some(cb)) => cb.on_pass_complete(pass, text.len()),
            (PassOutcome::Failed(e), Some(cb)) => cb.on_pass_failed(pass, &e.to_string()),
            _ => {}
        }
        match &outcome {
            PassOutcome::Success(text) => debug!("{} complete: {} chars", pass, text.len()),
            PassOutcome::Failed(e) => warn!("{} failed: {}", pass, e),
        }

        outcome
    }
}
