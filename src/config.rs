//! Configuration types for report analysis.
//!
//! Every knob of a run lives in [`AnalysisConfig`], built via
//! [`AnalysisConfigBuilder`]. The config carries host concerns only (which
//! provider, sampling, image encoding, downloads); the two prompts and the
//! fallback rules are fixed.

use crate::error::InsightError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used with a named provider when none is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for one report analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_insight::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .provider_name("openai")
///     .model("gpt-4.1-mini")
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier, e.g. "gpt-4o", "gemini-2.0-flash".
    /// If None, uses [`DEFAULT_MODEL`] for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.4.
    ///
    /// Pass 1 copies numbers out of the report and wants a low value; pass 2
    /// writes prose. 0.4 keeps values faithful while letting the
    /// interpretation read naturally.
    pub temperature: f32,

    /// Maximum tokens the model may generate per pass. Default: 8192.
    ///
    /// A multi-panel lab report can produce a long extraction table; a low
    /// limit truncates it and pass 2 then works from partial data.
    pub max_tokens: usize,

    /// JPEG quality used when re-encoding PDF images. Range 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Longest side, in pixels, of an image sent to the model. Default: 2000.
    ///
    /// Scanned pages embedded as images can be 5000+ px tall; larger images
    /// are downscaled before encoding to stay under provider upload limits.
    pub max_image_dimension: u32,

    /// Reuse completions for identical requests within the process. Default: true.
    pub use_cache: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for extraction and pass events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.4,
            max_tokens: 8192,
            jpeg_quality: 85,
            max_image_dimension: 2000,
            use_cache: true,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("use_cache", &self.use_cache)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(64);
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, InsightError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(InsightError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(InsightError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        if matches!(c.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(InsightError::InvalidConfig("model name is empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.temperature, 0.4);
        assert_eq!(c.max_tokens, 8192);
        assert_eq!(c.jpeg_quality, 85);
        assert!(c.use_cache);
        assert!(c.provider.is_none());
    }

    #[test]
    fn setters_clamp() {
        let c = AnalysisConfig::builder()
            .temperature(5.0)
            .jpeg_quality(0)
            .max_image_dimension(1)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.max_image_dimension, 64);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = AnalysisConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, InsightError::InvalidConfig(_)));
    }

    #[test]
    fn blank_model_rejected() {
        assert!(AnalysisConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn debug_hides_callbacks() {
        let c = AnalysisConfig::builder()
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{:?}", c);
        assert!(dbg.contains("<dyn AnalysisProgressCallback>"));
        assert!(dbg.contains("provider: None"));
    }
}
