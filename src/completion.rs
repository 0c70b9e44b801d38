//! The completion-service seam between the orchestrator and a model.
//!
//! The orchestrator only ever sees [`CompletionService`]; transport,
//! authentication, model choice and image re-encoding all live behind it.
//! [`crate::pipeline::llm::LlmCompletionService`] is the production adapter;
//! tests plug in deterministic stubs.

use crate::document::ExtractedImage;
use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A text (optionally image-conditioned) completion backend.
///
/// Calls are safe to repeat, but the orchestrator never retries: one failed
/// call is final for that pass.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Single-turn text completion.
    async fn complete_text(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Completion conditioned on `prompt` and `images`, in order.
    ///
    /// Images arrive in whatever encoding the PDF stored them in; converting
    /// them to what the transport accepts is the implementation's job. An
    /// empty slice must behave exactly like [`CompletionService::complete_text`].
    async fn complete_multimodal(
        &self,
        prompt: &str,
        images: &[ExtractedImage],
    ) -> Result<String, CompletionError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "completion"
    }

    /// Identity of the backend as far as cached answers are concerned.
    ///
    /// Two services may share a [`crate::cache::CompletionCache`] only if
    /// they return the same namespace exactly when they would answer the
    /// same prompt the same way. Implementations with a model or sampling
    /// settings must include them.
    fn cache_namespace(&self) -> &str {
        self.name()
    }
}

/// Which operation a call used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionMode {
    Text,
    Multimodal,
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionMode::Text => f.write_str("text"),
            CompletionMode::Multimodal => f.write_str("multimodal"),
        }
    }
}
