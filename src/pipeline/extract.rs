//! Content extraction: PDF → page-ordered text + embedded images.
//!
//! ## Why lopdf?
//!
//! Image XObjects must reach the completion adapter exactly as they are
//! stored in the file (a JPEG stays a JPEG, Flate samples stay compressed).
//! `lopdf` exposes the object graph directly, so each image reference on a
//! page can be resolved on its own and a dangling or corrupt one can be
//! skipped without losing the rest of the page.
//!
//! ## Why spawn_blocking?
//!
//! Parsing and text decoding are CPU-bound and synchronous. Running them on
//! the blocking pool keeps Tokio worker threads free. The parsed
//! [`lopdf::Document`] is owned by that blocking call and dropped before it
//! returns, on success and on every error path.

use crate::document::{ExtractedDocument, ExtractedImage, ImageEncoding, ImageWarning, PredictorParams};
use crate::error::ExtractionError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::{debug, info, warn};

/// Page-tree depth after which inherited resources are no longer searched.
const MAX_TREE_DEPTH: usize = 32;

/// The `%PDF` header must start within this many leading bytes.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Extract text and images from the PDF at `pdf_path`.
///
/// Runs [`extract_blocking`] on the blocking thread pool.
pub async fn extract(pdf_path: &Path) -> Result<ExtractedDocument, ExtractionError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_blocking(&path))
        .await
        .map_err(|e| ExtractionError::Unknown(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract`].
pub fn extract_blocking(pdf_path: &Path) -> Result<ExtractedDocument, ExtractionError> {
    let bytes = read_checked(pdf_path)?;
    debug!("Attempting to open PDF: {}", pdf_path.display());

    let document = Document::load_mem(&bytes).map_err(|e| ExtractionError::MalformedDocument {
        path: pdf_path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    let page_count = pages.len();
    info!("PDF loaded: {} pages", page_count);

    let mut pages_text = Vec::with_capacity(page_count);
    let mut images = Vec::new();
    let mut warnings = Vec::new();

    for (page_num, page_id) in pages {
        debug!("Processing page {}/{}", page_num, page_count);

        pages_text.push(page_text(&document, pdf_path, page_num, page_id)?);

        collect_page_images(
            &document,
            page_num as usize,
            page_id,
            &mut images,
            &mut warnings,
        );
    }

    info!(
        "Extracted text from {} pages and found {} images ({} skipped)",
        page_count,
        images.len(),
        warnings.len()
    );

    Ok(ExtractedDocument::from_pages(pages_text, images, warnings))
}

/// Check the file exists, is non-empty and looks like a PDF, then read it.
fn read_checked(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractionError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(ExtractionError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    if !meta.is_file() {
        return Err(ExtractionError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if meta.len() == 0 {
        return Err(ExtractionError::Empty {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| ExtractionError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(4).any(|w| w == b"%PDF") {
        return Err(ExtractionError::MalformedDocument {
            path: path.to_path_buf(),
            detail: "missing %PDF header".to_string(),
        });
    }

    Ok(bytes)
}

/// Decode the text layer of one page.
///
/// A page that draws text the reader cannot decode fails the whole document.
/// Only a page that draws no text at all may come back blank.
fn page_text(
    document: &Document,
    path: &Path,
    page_num: u32,
    page_id: ObjectId,
) -> Result<String, ExtractionError> {
    let undecodable = |detail: String| ExtractionError::MalformedDocument {
        path: path.to_path_buf(),
        detail: format!("page {}: text could not be decoded: {}", page_num, detail),
    };

    let text = document
        .extract_text(&[page_num])
        .map_err(|e| undecodable(e.to_string()))?;

    // lopdf skips strings drawn with a font it has no encoding for.
    if text.trim().is_empty() && shows_text(document, page_id) {
        return Err(undecodable(
            "text-showing operators produced no characters".to_string(),
        ));
    }

    Ok(text)
}

/// True when the page content draws at least one non-blank string.
fn shows_text(document: &Document, page_id: ObjectId) -> bool {
    let Ok(content) = document.get_and_decode_page_content(page_id) else {
        return false;
    };
    content
        .operations
        .iter()
        .filter(|op| matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\""))
        .any(|op| op.operands.iter().any(has_visible_bytes))
}

fn has_visible_bytes(operand: &Object) -> bool {
    match operand {
        Object::String(bytes, _) => bytes.iter().any(|b| !b.is_ascii_whitespace()),
        Object::Array(items) => items.iter().any(has_visible_bytes),
        _ => false,
    }
}

/// Resolve every image reference on one page, skipping the ones that fail.
fn collect_page_images(
    document: &Document,
    page_num: usize,
    page_id: ObjectId,
    images: &mut Vec<ExtractedImage>,
    warnings: &mut Vec<ImageWarning>,
) {
    let Some(xobjects) = page_xobjects(document, page_id) else {
        return;
    };

    let mut index_on_page = 0;
    for (name, entry) in xobjects.iter() {
        match resolve_image(document, entry) {
            Ok(Some(stream)) => {
                images.push(image_from_stream(document, page_num, index_on_page, stream));
                index_on_page += 1;
            }
            // Form XObjects and other non-image entries.
            Ok(None) => {}
            Err(reason) => {
                warn!(
                    "Page {}: skipping image /{} (index {}): {}",
                    page_num,
                    String::from_utf8_lossy(name),
                    index_on_page,
                    reason
                );
                warnings.push(ImageWarning {
                    page_num,
                    index_on_page,
                    reason,
                });
                index_on_page += 1;
            }
        }
    }
}

/// The page's `/XObject` dictionary, following `/Parent` for inherited resources.
fn page_xobjects(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(node_id).ok()?;

        if let Ok(resources) = node.get(b"Resources") {
            let resources = resolve(document, resources).ok()?.as_dict().ok()?;
            let xobjects = resources.get(b"XObject").ok()?;
            return resolve(document, xobjects).ok()?.as_dict().ok();
        }

        node_id = node.get(b"Parent").ok()?.as_reference().ok()?;
    }

    None
}

/// Resolve one `/XObject` entry.
///
/// `Ok(None)` means the entry is a valid non-image XObject.
fn resolve_image<'a>(document: &'a Document, entry: &'a Object) -> Result<Option<&'a Stream>, String> {
    let target = resolve(document, entry).map_err(|e| format!("unresolvable reference: {}", e))?;
    let stream = target
        .as_stream()
        .map_err(|_| "XObject is not a stream".to_string())?;

    let is_image = stream
        .dict
        .get(b"Subtype")
        .and_then(|s| s.as_name())
        .map(|n| n == b"Image")
        .unwrap_or(false);
    if !is_image {
        return Ok(None);
    }

    if stream.content.is_empty() {
        return Err("image stream has no data".to_string());
    }

    Ok(Some(stream))
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id),
        other => Ok(other),
    }
}

fn image_from_stream(
    document: &Document,
    page_num: usize,
    index_on_page: usize,
    stream: &Stream,
) -> ExtractedImage {
    let dict = &stream.dict;
    let mut image = ExtractedImage::new(page_num, index_on_page, stream.content.clone())
        .with_encoding(image_encoding(dict));

    let dim = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|v| v.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    };
    if let (Some(w), Some(h)) = (dim(b"Width"), dim(b"Height")) {
        image = image.with_dimensions(w, h);
    }

    if let Some(bpc) = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u8::try_from(v).ok())
    {
        image = image.with_bits_per_component(bpc);
    }

    if let Some(n) = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|cs| color_components(document, cs))
    {
        image = image.with_color_components(n);
    }

    if let Some(params) = predictor_params(document, dict) {
        image = image.with_predictor(params);
    }

    debug!(
        "Page {}: image {} → {} bytes ({:?})",
        page_num,
        index_on_page,
        image.image_bytes.len(),
        image.encoding
    );

    image
}

/// Map the stream's `/Filter` entry to an [`ImageEncoding`].
fn image_encoding(dict: &Dictionary) -> ImageEncoding {
    let filter = match dict.get(b"Filter") {
        Ok(f) => f,
        Err(_) => return ImageEncoding::Unfiltered,
    };

    let names: Vec<String> = match filter {
        Object::Name(n) => vec![String::from_utf8_lossy(n).into_owned()],
        Object::Array(items) => items
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => return ImageEncoding::Unknown,
    };

    match names.as_slice() {
        [] => ImageEncoding::Unfiltered,
        [single] => match single.as_str() {
            "DCTDecode" | "DCT" => ImageEncoding::Jpeg,
            "JPXDecode" => ImageEncoding::Jpeg2000,
            "FlateDecode" | "Fl" => ImageEncoding::Flate,
            other => ImageEncoding::Other(other.to_string()),
        },
        chain => ImageEncoding::Other(chain.join("+")),
    }
}

/// Predictor settings from `/DecodeParms`, when a predictor other than 1 is set.
///
/// With a filter chain the entry is an array; the first dictionary in it is used.
fn predictor_params(document: &Document, dict: &Dictionary) -> Option<PredictorParams> {
    let parms = match resolve(document, dict.get(b"DecodeParms").ok()?).ok()? {
        Object::Dictionary(d) => d,
        Object::Array(items) => items
            .iter()
            .filter_map(|o| resolve(document, o).ok())
            .find_map(|o| o.as_dict().ok())?,
        _ => return None,
    };

    let int = |key: &[u8], default: i64| {
        parms
            .get(key)
            .ok()
            .and_then(|v| v.as_i64().ok())
            .unwrap_or(default)
    };
    let predictor = u8::try_from(int(b"Predictor", 1)).ok()?;
    if predictor <= 1 {
        return None;
    }

    Some(PredictorParams {
        predictor,
        colors: u8::try_from(int(b"Colors", 1)).ok()?,
        columns: u32::try_from(int(b"Columns", 1)).ok()?,
    })
}

/// Component count of a device or ICC-based colour space.
fn color_components(document: &Document, color_space: &Object) -> Option<u8> {
    match resolve(document, color_space).ok()? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            if family != b"ICCBased" {
                return None;
            }
            let profile = resolve(document, items.get(1)?).ok()?.as_stream().ok()?;
            let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
            u8::try_from(n).ok()
        }
        _ => None,
    }
}
