//! Pipeline stages around the two-pass analysis core.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ [Analyzer] ──▶ llm ──▶ encode        postprocess
//! (URL/path) (lopdf)               (provider) (JPEG)         (report view)
//! ```
//!
//! 1. [`input`]  : canonicalise a path, URL or upload to a local file
//! 2. [`extract`]: page-ordered text and raw embedded images; runs in
//!    `spawn_blocking` because parsing is synchronous
//! 3. [`llm`]    : the `CompletionService` backed by an edgequake-llm provider;
//!    the only stage with network I/O besides downloads
//! 4. [`encode`] : decode whatever the PDF stored and re-encode it as RGB
//!    JPEG for the multimodal request
//! 5. [`postprocess`]: cleanup applied when a report is rendered as Markdown

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
