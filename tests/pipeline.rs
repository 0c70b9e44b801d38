//! Integration tests: PDFs synthesised with lopdf → extraction → analysis
//! against a scripted completion service.
//!
//! No network access or API key is needed.

use async_trait::async_trait;
use edgequake_llm::MockProvider;
use edgequake_pdf_insight::document::page_marker;
use edgequake_pdf_insight::pipeline::encode::encode_image;
use edgequake_pdf_insight::{
    analyze_report, analyze_report_from_bytes, analyze_report_to_file, extract, extract_blocking,
    inspect, AnalysisConfig, AnalysisError, AnalysisProgressCallback, Analyzer, CompletionError,
    CompletionService, ExtractedImage, ExtractionError, ImageEncoding, InsightError,
};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── PDF builder ──────────────────────────────────────────────────────────────

/// One XObject entry to place in a page's resources.
enum XObj {
    /// DCT-encoded RGB image.
    Jpeg(u32, u32),
    /// Flate-compressed 8-bit grayscale samples.
    FlateGray(u32, u32),
    /// Reference to an object that does not exist.
    Dangling,
    /// A form XObject (not an image).
    Form,
}

struct PageSpec {
    text: &'static str,
    xobjects: Vec<XObj>,
}

fn page(text: &'static str) -> PageSpec {
    PageSpec {
        text,
        xobjects: Vec::new(),
    }
}

fn page_with(text: &'static str, xobjects: Vec<XObj>) -> PageSpec {
    PageSpec { text, xobjects }
}

fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([180, 40, 40])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("jpeg encode");
    buf
}

fn flate_gray_bytes(w: u32, h: u32) -> Vec<u8> {
    let samples: Vec<u8> = (0..w * h).map(|i| (i % 256) as u8).collect();
    let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
    z.write_all(&samples).expect("deflate");
    z.finish().expect("deflate finish")
}

fn add_xobject(doc: &mut Document, spec: &XObj) -> Object {
    match *spec {
        XObj::Jpeg(w, h) => {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            };
            doc.add_object(Stream::new(dict, jpeg_bytes(w, h))).into()
        }
        XObj::FlateGray(w, h) => {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            doc.add_object(Stream::new(dict, flate_gray_bytes(w, h))).into()
        }
        XObj::Dangling => Object::Reference((9_999, 0)),
        XObj::Form => {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
            };
            doc.add_object(Stream::new(dict, b"0 0 m 10 10 l S".to_vec())).into()
        }
    }
}

fn text_content(text: &str) -> Vec<u8> {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    content.encode().expect("content encode")
}

/// Build a PDF with one page per entry. When `inherit_resources` is set the
/// resources of the first page are stored on the page-tree node instead.
fn build_pdf(pages: &[PageSpec], inherit_resources: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    let mut inherited: Option<Dictionary> = None;

    for spec in pages {
        let mut xobjects = Dictionary::new();
        for (i, x) in spec.xobjects.iter().enumerate() {
            let obj = add_xobject(&mut doc, x);
            xobjects.set(format!("Im{}", i), obj);
        }
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        };

        let content_id = doc.add_object(Stream::new(dictionary! {}, text_content(spec.text)));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        if inherit_resources && inherited.is_none() {
            inherited = Some(resources);
        } else {
            page_dict.set("Resources", resources);
        }
        kids.push(doc.add_object(page_dict).into());
    }

    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if let Some(resources) = inherited {
        pages_dict.set("Resources", resources);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save pdf");
    out
}

/// One-page PDF whose text is drawn with an `Identity-H` Type0 font that has
/// no `/ToUnicode` map, so the glyph codes cannot be turned back into text.
fn build_cid_font_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "ArialMT",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ArialMT",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant.into()],
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, text_content(text)));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save pdf");
    out
}

fn write_pdf(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write pdf");
    path
}

// ── Scripted completion service ──────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Call {
    Text(String),
    Multimodal(String, Vec<ExtractedImage>),
}

struct Scripted {
    responses: Mutex<Vec<Result<String, CompletionError>>>,
    calls: Mutex<Vec<Call>>,
}

impl Scripted {
    /// Responses are consumed in order.
    fn new(mut responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        responses.reverse();
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self) -> Result<String, CompletionError> {
        self.responses.lock().unwrap().pop().unwrap_or(Err(CompletionError::Provider {
            message: "no scripted response left".into(),
        }))
    }
}

#[async_trait]
impl CompletionService for Scripted {
    async fn complete_text(&self, prompt: &str) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(Call::Text(prompt.to_string()));
        self.next()
    }

    async fn complete_multimodal(
        &self,
        prompt: &str,
        images: &[ExtractedImage],
    ) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Multimodal(prompt.to_string(), images.to_vec()));
        self.next()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pages_are_marked_in_order() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(
        &[page("Hemoglobin 13.2"), page("LDL 162"), page("Impression normal")],
        false,
    );
    let path = write_pdf(&dir, "three.pdf", &pdf);

    let doc = extract(&path).await.expect("extraction should succeed");

    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.pages_text().len(), 3);
    let text = doc.full_text();
    let positions: Vec<usize> = (1..=3)
        .map(|n| text.find(&page_marker(n)).expect("marker present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "markers out of order");
    assert_eq!(text.matches("--- Page ").count(), 3);
    assert!(text.starts_with("--- Page 1 ---"));
    assert_eq!(text, text.trim());
    assert!(doc.pages_text()[1].contains("LDL"));
    assert!(doc.images().is_empty());
}

#[test]
fn zero_page_document_is_empty_not_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(&dir, "empty.pdf", &build_pdf(&[], false));

    let doc = extract_blocking(&path).expect("zero pages is not an error");
    assert_eq!(doc.page_count(), 0);
    assert!(doc.full_text().is_empty());
    assert!(doc.is_empty());
}

#[test]
fn images_are_collected_with_metadata() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(
        &[
            page_with("page one", vec![XObj::Jpeg(16, 8)]),
            page_with("page two", vec![XObj::FlateGray(4, 3), XObj::Jpeg(5, 5)]),
        ],
        false,
    );
    let path = write_pdf(&dir, "images.pdf", &pdf);
    let doc = extract_blocking(&path).unwrap();

    let positions: Vec<(usize, usize)> = doc.images().iter().map(|i| i.position()).collect();
    assert_eq!(positions, vec![(1, 0), (2, 0), (2, 1)]);

    let jpeg = &doc.images()[0];
    assert_eq!(jpeg.encoding, ImageEncoding::Jpeg);
    assert_eq!((jpeg.width, jpeg.height), (Some(16), Some(8)));
    assert!(jpeg.image_bytes.starts_with(&[0xFF, 0xD8]), "JPEG bytes kept as stored");

    let gray = &doc.images()[1];
    assert_eq!(gray.encoding, ImageEncoding::Flate);
    assert_eq!(gray.color_components, Some(1));
    assert_eq!(gray.bits_per_component, Some(8));

    // Stored payloads re-encode for transport.
    for img in doc.images() {
        let data = encode_image(img, 85, 2000).expect("re-encode");
        assert_eq!(data.mime_type, "image/jpeg");
    }
}

#[test]
fn unresolvable_image_is_skipped_with_warning() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(
        &[page_with(
            "scan page",
            vec![XObj::Jpeg(4, 4), XObj::Dangling, XObj::Jpeg(6, 6)],
        )],
        false,
    );
    let path = write_pdf(&dir, "dangling.pdf", &pdf);
    let doc = extract_blocking(&path).unwrap();

    assert_eq!(doc.images().len(), 2);
    assert_eq!(doc.warnings().len(), 1);
    let warning = &doc.warnings()[0];
    assert_eq!((warning.page_num, warning.index_on_page), (1, 1));
    let indices: Vec<usize> = doc.images().iter().map(|i| i.index_on_page).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(doc.summary().skipped_images, 1);
}

#[test]
fn form_xobjects_are_not_images() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(&[page_with("chart", vec![XObj::Form, XObj::Jpeg(3, 3)])], false);
    let doc = extract_blocking(&write_pdf(&dir, "form.pdf", &pdf)).unwrap();

    assert_eq!(doc.images().len(), 1);
    assert_eq!(doc.images()[0].index_on_page, 0);
    assert!(doc.warnings().is_empty());
}

#[test]
fn inherited_resources_are_found() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(&[page_with("inherits", vec![XObj::Jpeg(4, 4)])], true);
    let doc = extract_blocking(&write_pdf(&dir, "inherit.pdf", &pdf)).unwrap();
    assert_eq!(doc.images().len(), 1);
}

#[test]
fn missing_and_empty_files_are_distinguished() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.pdf");
    assert!(matches!(
        extract_blocking(&missing),
        Err(ExtractionError::NotFound { .. })
    ));

    let empty = write_pdf(&dir, "zero.pdf", b"");
    assert!(matches!(
        extract_blocking(&empty),
        Err(ExtractionError::Empty { .. })
    ));

    let junk = write_pdf(&dir, "junk.pdf", b"%PDF-1.7\nthis is not really a pdf");
    assert!(matches!(
        extract_blocking(&junk),
        Err(ExtractionError::MalformedDocument { .. })
    ));
}

#[test]
fn undecodable_page_text_fails_the_document() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(&dir, "cid.pdf", &build_cid_font_pdf("Hemoglobin 13.2 g/dL"));

    match extract_blocking(&path) {
        Err(ExtractionError::MalformedDocument { detail, .. }) => {
            assert!(detail.contains("page 1"), "got: {detail}");
        }
        other => panic!("expected MalformedDocument, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_page_text_never_reaches_the_model() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(&dir, "cid.pdf", &build_cid_font_pdf("Glucose 5.4 mmol/L"));

    let mock = MockProvider::new();
    mock.add_response("should not be used").await;
    let config = AnalysisConfig::builder()
        .provider(Arc::new(mock))
        .use_cache(false)
        .build()
        .unwrap();

    let err = analyze_report(path.to_string_lossy(), &config).await.unwrap_err();
    assert!(err.is_parse_failure(), "got {err}");
}

// ── Extraction + analysis ────────────────────────────────────────────────────

#[tokio::test]
async fn text_report_runs_both_passes_as_text() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(&[page("Cholesterol 240 mg/dL")], false);
    let doc = extract(&write_pdf(&dir, "lipids.pdf", &pdf)).await.unwrap();

    let service = Scripted::new(vec![Ok("- Cholesterol: 240 mg/dL".into()), Ok("Elevated.".into())]);
    let result = Analyzer::new(service.clone()).analyze(&doc).await.unwrap();

    assert_eq!(result.initial_extraction.as_deref(), Some("- Cholesterol: 240 mg/dL"));
    assert_eq!(result.final_analysis, "Elevated.");
    let calls = service.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| matches!(c, Call::Text(_))));
}

#[tokio::test]
async fn dangling_image_report_sends_surviving_images_in_order() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(
        &[
            page_with("x-ray", vec![XObj::Jpeg(4, 4), XObj::Dangling]),
            page_with("ultrasound", vec![XObj::Jpeg(5, 5)]),
        ],
        false,
    );
    let doc = extract(&write_pdf(&dir, "imaging.pdf", &pdf)).await.unwrap();
    assert_eq!(doc.warnings().len(), 1);

    let service = Scripted::new(vec![
        Err(CompletionError::Provider {
            message: "rate limited".into(),
        }),
        Ok("Findings look unremarkable.".into()),
    ]);
    let result = Analyzer::new(service.clone()).analyze(&doc).await.unwrap();

    assert!(result.initial_extraction.is_none());
    match &service.calls()[1] {
        Call::Multimodal(prompt, images) => {
            assert!(prompt.contains(doc.full_text()));
            let positions: Vec<(usize, usize)> = images.iter().map(|i| i.position()).collect();
            assert_eq!(positions, vec![(1, 0), (2, 0)]);
            assert_eq!(images[0].image_bytes, doc.images()[0].image_bytes);
        }
        other => panic!("expected multimodal synthesis, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_pdf_is_refused_before_any_call() {
    let dir = TempDir::new().unwrap();
    let doc = extract(&write_pdf(&dir, "empty.pdf", &build_pdf(&[], false)))
        .await
        .unwrap();

    let service = Scripted::new(vec![]);
    let err = Analyzer::new(service.clone()).analyze(&doc).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NothingToAnalyze));
    assert!(service.calls().is_empty());
}

// ── Host entry points (no provider needed on these paths) ────────────────────

#[test]
fn inspect_summarises_without_a_provider() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(
        &[page_with("a", vec![XObj::Jpeg(2, 2), XObj::Dangling]), page("b")],
        false,
    );
    let path = write_pdf(&dir, "summary.pdf", &pdf);

    let summary = tokio_test::block_on(inspect(path.to_string_lossy())).unwrap();
    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.image_count, 1);
    assert_eq!(summary.skipped_images, 1);
}

#[tokio::test]
async fn parse_failure_is_reported_as_such() {
    let err = analyze_report_from_bytes(b"GIF89a not a pdf", "upload.pdf", &AnalysisConfig::default())
        .await
        .unwrap_err();
    assert!(err.is_parse_failure(), "got {err}");
    assert!(err.to_string().starts_with("Failed to parse"));
}

#[derive(Default)]
struct Completion(Mutex<Vec<bool>>);

impl AnalysisProgressCallback for Completion {
    fn on_analysis_complete(&self, success: bool) {
        self.0.lock().unwrap().push(success);
    }
}

#[tokio::test]
async fn empty_report_is_an_analysis_failure() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(&dir, "blank.pdf", &build_pdf(&[], false));
    let completion = Arc::new(Completion::default());
    let config = AnalysisConfig::builder()
        .progress_callback(completion.clone())
        .build()
        .unwrap();

    let err = analyze_report(path.to_string_lossy(), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InsightError::Analysis(AnalysisError::NothingToAnalyze)
    ));
    assert_eq!(*completion.0.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn shared_cache_does_not_cross_backends() {
    let dir = TempDir::new().unwrap();
    let pdf = build_pdf(&[page("Ferritin 12 ng/mL (ref 30-400)")], false);
    let path = write_pdf(&dir, "ferritin.pdf", &pdf);
    let input = path.to_string_lossy().to_string();

    let first = MockProvider::new();
    first.add_response("A-extract").await;
    first.add_response("A-synth").await;
    let config_a = AnalysisConfig::builder()
        .provider(Arc::new(first))
        .temperature(0.4)
        .build()
        .unwrap();

    let second = MockProvider::new();
    second.add_response("B-extract").await;
    second.add_response("B-synth").await;
    let config_b = AnalysisConfig::builder()
        .provider(Arc::new(second))
        .temperature(0.0)
        .build()
        .unwrap();

    let a = analyze_report(&input, &config_a).await.unwrap();
    let b = analyze_report(&input, &config_b).await.unwrap();

    assert_eq!(a.result.initial_extraction.as_deref(), Some("A-extract"));
    assert_eq!(a.result.final_analysis, "A-synth");
    assert_eq!(b.result.initial_extraction.as_deref(), Some("B-extract"));
    assert_eq!(b.result.final_analysis, "B-synth");
    assert_eq!(b.stats.cache_hits, 0);

    // Same backend again: both passes come from the cache.
    let again = analyze_report(&input, &config_a).await.unwrap();
    assert_eq!(again.result, a.result);
    assert_eq!(again.stats.cache_hits, 2);
}

#[tokio::test]
async fn failed_run_leaves_no_output_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.md");
    let missing = dir.path().join("missing.pdf");

    let err = analyze_report_to_file(missing.to_string_lossy(), &out, &AnalysisConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InsightError::Extraction(ExtractionError::NotFound { .. })
    ));
    assert!(!Path::new(&out).exists());
}
