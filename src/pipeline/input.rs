//! Input resolution: turn a user-supplied path, URL or uploaded bytes into a
//! local PDF file.
//!
//! ## Why a temp directory?
//!
//! The extractor works from a filesystem path. Downloads and uploads are
//! written into a `TempDir` owned by [`ResolvedInput`]; dropping it removes
//! the file, on success and on every error path alike.
//!
//! Local paths are passed through untouched. Existence, emptiness and the
//! `%PDF` header are checked by the extractor so that a bad local file is
//! reported as a parse failure.

use crate::error::InsightError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Name used when neither the URL nor the caller supplies one.
const FALLBACK_FILENAME: &str = "report.pdf";

/// The resolved input, either a local path or a file inside a managed temp directory.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL or an in-memory upload. The `TempDir` is kept alive
    /// until processing completes.
    Temporary { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
///
/// URLs are downloaded to a temporary directory; anything else is treated as
/// a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, InsightError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || (trimmed.contains("://") && !is_url(trimmed)) {
        return Err(InsightError::InvalidInput {
            input: input.to_string(),
        });
    }

    if is_url(trimmed) {
        download_url(trimmed, timeout_secs).await
    } else {
        debug!("Resolved local PDF: {}", trimmed);
        Ok(ResolvedInput::Local(PathBuf::from(trimmed)))
    }
}

/// Write uploaded bytes to a managed temp file named after `name`.
pub async fn from_bytes(bytes: &[u8], name: &str) -> Result<ResolvedInput, InsightError> {
    let temp_dir = TempDir::new().map_err(|e| InsightError::Internal(format!("tempdir: {e}")))?;
    let file_path = temp_dir.path().join(sanitize_filename(name));

    tokio::fs::write(&file_path, bytes)
        .await
        .map_err(|e| InsightError::Internal(format!("Failed to write temp file: {}", e)))?;

    debug!("Staged {} uploaded bytes at {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Temporary {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, InsightError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InsightError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| download_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(InsightError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;

    let resolved = from_bytes(&bytes, &filename_from_url(url)).await?;
    info!("Downloaded {} bytes to: {}", bytes.len(), resolved.path().display());
    Ok(resolved)
}

fn download_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        InsightError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Last path segment of the URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Keep only the final path component and replace characters that are
/// awkward in filenames.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}
