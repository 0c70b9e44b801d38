//! Production [`CompletionService`] backed by an `edgequake-llm` provider.
//!
//! Every request is two messages: the fixed system-role prompt and
//! one user turn carrying the prompt text, plus base64 JPEG attachments for
//! multimodal calls. Image re-encoding happens here, not in the orchestrator,
//! so stubs used in tests see the images exactly as the extractor produced
//! them.
//!
//! No retries: a provider error is returned as-is and the orchestrator
//! decides what a failed pass means.

use crate::completion::{CompletionMode, CompletionService};
use crate::config::AnalysisConfig;
use crate::document::ExtractedImage;
use crate::error::CompletionError;
use crate::pipeline::encode;
use crate::prompts::SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// [`CompletionService`] that talks to a vision-capable chat model.
pub struct LlmCompletionService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    jpeg_quality: u8,
    max_image_dimension: u32,
    namespace: String,
}

impl LlmCompletionService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        let namespace = cache_namespace(&*provider, config);
        Self {
            provider,
            options: build_options(config),
            jpeg_quality: config.jpeg_quality,
            max_image_dimension: config.max_image_dimension,
            namespace,
        }
    }

    async fn send(
        &self,
        mode: CompletionMode,
        prompt: &str,
        images: Vec<ImageData>,
    ) -> Result<String, CompletionError> {
        let start = Instant::now();
        let image_count = images.len();

        let user = if images.is_empty() {
            ChatMessage::user(prompt)
        } else {
            ChatMessage::user_with_images(prompt, images)
        };
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), user];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| CompletionError::Provider {
                message: e.to_string(),
            })?;

        debug!(
            "{} completion via {}: {} images, {} input tokens, {} output tokens, {:?}",
            mode,
            self.provider.name(),
            image_count,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content)
    }
}

impl fmt::Debug for LlmCompletionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCompletionService")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("temperature", &self.options.temperature)
            .field("max_tokens", &self.options.max_tokens)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

#[async_trait]
impl CompletionService for LlmCompletionService {
    async fn complete_text(&self, prompt: &str) -> Result<String, CompletionError> {
        self.send(CompletionMode::Text, prompt, Vec::new()).await
    }

    async fn complete_multimodal(
        &self,
        prompt: &str,
        images: &[ExtractedImage],
    ) -> Result<String, CompletionError> {
        if images.is_empty() {
            return self.complete_text(prompt).await;
        }

        let encoded = encode::encode_images(images, self.jpeg_quality, self.max_image_dimension);
        if encoded.is_empty() {
            warn!(
                "{}; sending the synthesis prompt as text only",
                CompletionError::NoUsableImages
            );
            return self.complete_text(prompt).await;
        }
        if encoded.len() < images.len() {
            warn!(
                "Sending {} of {} images; the rest could not be re-encoded",
                encoded.len(),
                images.len()
            );
        }

        self.send(CompletionMode::Multimodal, prompt, encoded).await
    }

    fn name(&self) -> &str {
        self.provider.name()
    }

    fn cache_namespace(&self) -> &str {
        &self.namespace
    }
}

/// Everything that changes what the model would answer for a given prompt.
fn cache_namespace(provider: &dyn LLMProvider, config: &AnalysisConfig) -> String {
    format!(
        "{}/{}/t={}/max={}/q={}/dim={}",
        provider.name(),
        provider.model(),
        config.temperature,
        config.max_tokens,
        config.jpeg_quality,
        config.max_image_dimension
    )
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
