//! Host entry points: input → extraction → analysis → report.
//!
//! These functions own everything around the two-pass core: resolving a path
//! or URL, picking an LLM provider, sharing the completion cache across runs,
//! timing each stage and writing the rendered report.
//!
//! The PDF is extracted before a provider is resolved, so a file that cannot
//! be parsed (or has nothing in it) is reported as such even on a machine
//! with no API key configured.

use crate::analyze::Analyzer;
use crate::cache::CompletionCache;
use crate::config::{AnalysisConfig, DEFAULT_MODEL};
use crate::document::DocumentSummary;
use crate::error::{AnalysisError, InsightError};
use crate::output::{AnalysisReport, AnalysisStats};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{extract, llm::LlmCompletionService};
use edgequake_llm::{LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Completion cache shared by every run in this process.
static SHARED_CACHE: Lazy<Arc<CompletionCache>> = Lazy::new(|| Arc::new(CompletionCache::new()));

/// Download timeout used by [`inspect`], which takes no config.
const INSPECT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Analyse a PDF report from a local path or HTTP(S) URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// - [`InsightError::Extraction`] when the PDF cannot be parsed
/// - [`InsightError::Analysis`] when there is nothing to analyse or the
///   synthesis pass fails
/// - input, download and provider errors as their own variants
pub async fn analyze_report(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, InsightError> {
    let input_str = input_str.as_ref();
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_resolved(input_str, &resolved, config).await
}

/// Analyse PDF bytes held in memory (an upload, a database blob).
///
/// The bytes are written to a managed temp file that is removed when this
/// function returns. `name` is used as the report's source label.
pub async fn analyze_report_from_bytes(
    bytes: &[u8],
    name: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, InsightError> {
    let resolved = input::from_bytes(bytes, name).await?;
    analyze_resolved(name, &resolved, config).await
}

/// Analyse a report and write it to `output_path` as Markdown.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial report behind.
pub async fn analyze_report_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, InsightError> {
    let report = analyze_report(input_str, config).await?;
    write_atomic(output_path.as_ref(), &report.to_markdown(true)).await?;
    Ok(report)
}

/// Synchronous wrapper around [`analyze_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_report_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, InsightError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InsightError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_report(input_str, config))
}

/// Extract a PDF and report what it contains, without calling a model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentSummary, InsightError> {
    let resolved = input::resolve_input(input_str.as_ref(), INSPECT_DOWNLOAD_TIMEOUT_SECS).await?;
    let document = extract::extract(resolved.path()).await?;
    Ok(document.summary())
}

/// Clear the process-wide completion cache.
pub fn clear_cache() {
    SHARED_CACHE.clear();
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn analyze_resolved(
    source: &str,
    resolved: &ResolvedInput,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, InsightError> {
    let total_start = Instant::now();
    info!("Starting analysis: {}", source);

    // ── Step 1: Extract text and images ──────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(source);
    }
    let extract_start = Instant::now();
    let document = extract::extract(resolved.path()).await?;
    let extraction_ms = extract_start.elapsed().as_millis() as u64;

    info!(
        "Extracted {} pages, {} images ({} skipped) in {}ms",
        document.page_count(),
        document.images().len(),
        document.warnings().len(),
        extraction_ms
    );
    if let Some(ref cb) = config.progress_callback {
        for warning in document.warnings() {
            cb.on_image_skipped(warning.page_num, &warning.reason);
        }
        cb.on_extraction_complete(document.page_count(), document.images().len());
    }

    // Nothing to send; skip provider setup entirely.
    if document.is_empty() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_analysis_complete(false);
        }
        return Err(AnalysisError::NothingToAnalyze.into());
    }

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config)?;
    let service = Arc::new(LlmCompletionService::new(provider, config));
    debug!("Using completion service {:?}", service);

    // ── Step 3: Two-pass analysis ────────────────────────────────────────
    let mut analyzer = Analyzer::new(service);
    let hits_before = SHARED_CACHE.hits();
    if config.use_cache {
        analyzer = analyzer.with_cache(Arc::clone(&SHARED_CACHE));
    }
    if let Some(ref cb) = config.progress_callback {
        analyzer = analyzer.with_progress(Arc::clone(cb));
    }

    let analysis_start = Instant::now();
    let result = analyzer.analyze(&document).await?;
    let analysis_ms = analysis_start.elapsed().as_millis() as u64;

    let cache_hits = if config.use_cache {
        SHARED_CACHE.hits().saturating_sub(hits_before)
    } else {
        0
    };

    let stats = AnalysisStats {
        extraction_ms,
        analysis_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        cache_hits,
    };
    info!(
        "Analysis of {} complete in {}ms ({} cache hits)",
        source, stats.total_ms, stats.cache_hits
    );

    Ok(AnalysisReport {
        source: source.to_string(),
        document: document.summary(),
        result,
        stats,
    })
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), InsightError> {
    let write_err = |e: std::io::Error| InsightError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, InsightError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InsightError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    when both are set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, InsightError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InsightError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
