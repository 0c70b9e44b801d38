//! Process-lifetime cache of completion results.
//!
//! Identical prompts (and identical image sets, for multimodal calls) sent to
//! the same backend produce identical requests, so the answer from the first
//! call can be reused. The backend is identified by
//! [`crate::completion::CompletionService::cache_namespace`], which covers the
//! provider, model and sampling settings. The
//! cache is advisory: the orchestrator behaves the same with or without it,
//! it only saves external calls.
//!
//! Only successful completions are stored. A failed call is never cached, so a
//! later run with the same input reaches the service again.

use crate::completion::CompletionMode;
use crate::document::ExtractedImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// SHA-256 over (namespace, operation, prompt, ordered image digests), hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn text(namespace: &str, prompt: &str) -> Self {
        Self::compute(namespace, CompletionMode::Text, prompt, &[])
    }

    /// Key for a multimodal call. With no images this equals [`CacheKey::text`],
    /// matching the service contract that such a call is a text call.
    pub fn multimodal(namespace: &str, prompt: &str, images: &[ExtractedImage]) -> Self {
        if images.is_empty() {
            return Self::text(namespace, prompt);
        }
        Self::compute(namespace, CompletionMode::Multimodal, prompt, images)
    }

    fn compute(namespace: &str, mode: CompletionMode, prompt: &str, images: &[ExtractedImage]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((namespace.len() as u64).to_le_bytes());
        hasher.update(namespace.as_bytes());
        hasher.update(mode.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update((prompt.len() as u64).to_le_bytes());
        hasher.update(prompt.as_bytes());
        hasher.update((images.len() as u64).to_le_bytes());
        for image in images {
            hasher.update(Sha256::digest(&image.image_bytes));
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Thread-safe in-memory completion cache.
#[derive(Debug, Default)]
pub struct CompletionCache {
    entries: Mutex<HashMap<CacheKey, String>>,
    hits: AtomicUsize,
}

impl CompletionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let found = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned();

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Completion cache hit: {}", &key.as_str()[..12]);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, value);
    }

    /// Number of lookups answered from the cache so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
