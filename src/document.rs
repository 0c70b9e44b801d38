//! Extracted document content handed from the extractor to the analyzer.
//!
//! An [`ExtractedDocument`] is built once per input file and never mutated
//! afterwards, so its fields are private and it can only be assembled through
//! [`ExtractedDocument::from_pages`], which owns the page-marker format and
//! the image ordering invariant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker line written before each page's text in [`ExtractedDocument::full_text`].
pub fn page_marker(page_num: usize) -> String {
    format!("--- Page {} ---", page_num)
}

/// How an image stream is encoded inside the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// `DCTDecode`: the bytes are a complete JPEG file.
    Jpeg,
    /// `JPXDecode`: the bytes are a JPEG 2000 codestream.
    Jpeg2000,
    /// `FlateDecode`: zlib-compressed raw samples.
    Flate,
    /// No filter: raw samples.
    Unfiltered,
    /// Any other filter or filter chain, by name.
    Other(String),
    /// The filter entry could not be read.
    #[default]
    Unknown,
}

/// `/DecodeParms` predictor settings of a Flate image stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorParams {
    /// 2 for TIFF, 10..=15 for PNG row filters.
    pub predictor: u8,
    pub colors: u8,
    pub columns: u32,
}

/// One image embedded in the document, exactly as stored.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 1-based page number.
    pub page_num: usize,
    /// 0-based position among the image references discovered on the page.
    pub index_on_page: usize,
    /// Raw stream payload; never decoded or normalised here.
    pub image_bytes: Vec<u8>,
    pub encoding: ImageEncoding,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bits_per_component: Option<u8>,
    /// 1 for gray, 3 for RGB, 4 for CMYK when the colour space is a device space.
    pub color_components: Option<u8>,
    /// Set only when the samples were filtered with a predictor before compression.
    pub predictor: Option<PredictorParams>,
}

impl ExtractedImage {
    pub fn new(page_num: usize, index_on_page: usize, image_bytes: Vec<u8>) -> Self {
        Self {
            page_num,
            index_on_page,
            image_bytes,
            encoding: ImageEncoding::Unknown,
            width: None,
            height: None,
            bits_per_component: None,
            color_components: None,
            predictor: None,
        }
    }

    pub fn with_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_bits_per_component(mut self, bits: u8) -> Self {
        self.bits_per_component = Some(bits);
        self
    }

    pub fn with_color_components(mut self, n: u8) -> Self {
        self.color_components = Some(n);
        self
    }

    pub fn with_predictor(mut self, params: PredictorParams) -> Self {
        self.predictor = Some(params);
        self
    }

    /// Ordering key: `(page_num, index_on_page)`.
    pub fn position(&self) -> (usize, usize) {
        (self.page_num, self.index_on_page)
    }
}

impl fmt::Debug for ExtractedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedImage")
            .field("page_num", &self.page_num)
            .field("index_on_page", &self.index_on_page)
            .field("bytes", &self.image_bytes.len())
            .field("encoding", &self.encoding)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("predictor", &self.predictor)
            .finish()
    }
}

/// An image reference that was skipped during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageWarning {
    pub page_num: usize,
    pub index_on_page: usize,
    pub reason: String,
}

/// Page-ordered text and images of one PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    full_text: String,
    pages_text: Vec<String>,
    images: Vec<ExtractedImage>,
    warnings: Vec<ImageWarning>,
}

impl ExtractedDocument {
    /// Assemble a document from per-page texts (index = page number − 1).
    ///
    /// `full_text` is every page wrapped in its [`page_marker`], trimmed.
    /// Images are put in `(page_num, index_on_page)` order.
    pub fn from_pages(
        pages_text: Vec<String>,
        mut images: Vec<ExtractedImage>,
        warnings: Vec<ImageWarning>,
    ) -> Self {
        let mut full_text = String::new();
        for (idx, text) in pages_text.iter().enumerate() {
            full_text.push('\n');
            full_text.push_str(&page_marker(idx + 1));
            full_text.push('\n');
            full_text.push_str(text);
            full_text.push('\n');
        }

        images.sort_by_key(ExtractedImage::position);

        Self {
            full_text: full_text.trim().to_string(),
            pages_text,
            images,
            warnings,
        }
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn pages_text(&self) -> &[String] {
        &self.pages_text
    }

    pub fn images(&self) -> &[ExtractedImage] {
        &self.images
    }

    /// Raw image payloads in `(page_num, index_on_page)` order.
    pub fn image_payloads(&self) -> Vec<&[u8]> {
        self.images.iter().map(|i| i.image_bytes.as_slice()).collect()
    }

    /// Image references skipped during extraction, in discovery order.
    pub fn warnings(&self) -> &[ImageWarning] {
        &self.warnings
    }

    pub fn page_count(&self) -> usize {
        self.pages_text.len()
    }

    /// True when there is neither text nor an image to analyse.
    pub fn is_empty(&self) -> bool {
        self.full_text.is_empty() && self.images.is_empty()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            page_count: self.page_count(),
            image_count: self.images.len(),
            skipped_images: self.warnings.len(),
            text_chars: self.full_text.chars().count(),
        }
    }
}

/// Counts describing an extracted document, without its content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub page_count: usize,
    pub image_count: usize,
    pub skipped_images: usize,
    pub text_chars: usize,
}
