//! Image normalisation for multimodal requests: stored PDF image → base64 JPEG.
//!
//! PDF images arrive in whatever form the producer chose: complete JPEG
//! files, zlib-compressed sample grids, palettes, CMYK. Vision APIs accept a
//! handful of file formats, so every image is decoded, coerced to 8-bit RGB
//! (dropping alpha and resolving palettes) and written as JPEG. Images that
//! cannot be decoded are skipped by the caller rather than failing the call.

use crate::document::{ExtractedImage, ImageEncoding, PredictorParams};
use crate::error::CompletionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use std::io::Read;
use tracing::{debug, warn};

/// Decode, coerce to RGB, downscale to `max_dimension` and JPEG-encode one image.
pub fn encode_image(
    img: &ExtractedImage,
    quality: u8,
    max_dimension: u32,
) -> Result<ImageData, CompletionError> {
    let mut decoded = decode(img)?;

    if decoded.width() > max_dimension || decoded.height() > max_dimension {
        decoded = decoded.resize(max_dimension, max_dimension, FilterType::Triangle);
    }

    let rgb = decoded.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| CompletionError::Encoding {
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded page {} image {} → {}x{} JPEG, {} bytes base64",
        img.page_num,
        img.index_on_page,
        rgb.width(),
        rgb.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}

/// Encode every image that can be decoded, in order. Failures are logged and skipped.
pub fn encode_images(images: &[ExtractedImage], quality: u8, max_dimension: u32) -> Vec<ImageData> {
    images
        .iter()
        .filter_map(|img| match encode_image(img, quality, max_dimension) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(
                    "Could not re-encode image {} on page {}: {}",
                    img.index_on_page + 1,
                    img.page_num,
                    e
                );
                None
            }
        })
        .collect()
}

fn decode(img: &ExtractedImage) -> Result<DynamicImage, CompletionError> {
    match &img.encoding {
        ImageEncoding::Flate => {
            let mut samples = Vec::new();
            ZlibDecoder::new(img.image_bytes.as_slice())
                .read_to_end(&mut samples)
                .map_err(|e| CompletionError::Encoding {
                    detail: format!("inflate failed: {}", e),
                })?;
            if let Some(ref params) = img.predictor {
                samples = undo_predictor(samples, params, img.bits_per_component.unwrap_or(8))?;
            }
            from_samples(img, samples)
        }
        ImageEncoding::Unfiltered => from_samples(img, img.image_bytes.clone()),
        ImageEncoding::Jpeg2000 => Err(CompletionError::Encoding {
            detail: "JPEG 2000 images are not supported".to_string(),
        }),
        // JPEG and anything else: let `image` sniff the container format.
        _ => image::load_from_memory(&img.image_bytes).map_err(|e| CompletionError::Encoding {
            detail: e.to_string(),
        }),
    }
}

/// Rebuild a bitmap from raw 8-bit samples using the image dictionary's metadata.
fn from_samples(img: &ExtractedImage, samples: Vec<u8>) -> Result<DynamicImage, CompletionError> {
    let (Some(width), Some(height)) = (img.width, img.height) else {
        return Err(CompletionError::Encoding {
            detail: "raw samples without Width/Height".to_string(),
        });
    };
    if img.bits_per_component.unwrap_or(8) != 8 {
        return Err(CompletionError::Encoding {
            detail: format!("unsupported bit depth {:?}", img.bits_per_component),
        });
    }
    let components = img.color_components.ok_or_else(|| CompletionError::Encoding {
        detail: "unsupported colour space".to_string(),
    })?;

    let expected = width as usize * height as usize * components as usize;
    if samples.len() != expected {
        return Err(CompletionError::Encoding {
            detail: format!(
                "sample data is {} bytes, expected {} for {}x{}x{}",
                samples.len(),
                expected,
                width,
                height,
                components
            ),
        });
    }

    let too_small = || CompletionError::Encoding {
        detail: "sample buffer does not match dimensions".to_string(),
    };
    match components {
        1 => GrayImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(too_small),
        3 => RgbImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(too_small),
        4 => {
            let rgb: Vec<u8> = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(too_small)
        }
        n => Err(CompletionError::Encoding {
            detail: format!("unsupported component count {}", n),
        }),
    }
}

/// Reverse the TIFF or PNG predictor applied to inflated samples.
///
/// PNG rows carry their own filter tag byte, so any of 10..=15 decodes the
/// same way.
fn undo_predictor(
    data: Vec<u8>,
    params: &PredictorParams,
    bits_per_component: u8,
) -> Result<Vec<u8>, CompletionError> {
    let bits_per_pixel = params.colors as usize * bits_per_component as usize;
    let bpp = bits_per_pixel.div_ceil(8).max(1);
    let row_len = (params.columns as usize * bits_per_pixel).div_ceil(8);
    let bad = |detail: String| CompletionError::Encoding { detail };

    if row_len == 0 {
        return Err(bad("predictor with zero-width rows".to_string()));
    }

    match params.predictor {
        2 => {
            if bits_per_component != 8 {
                return Err(bad(format!(
                    "TIFF predictor with {}-bit samples",
                    bits_per_component
                )));
            }
            if data.len() % row_len != 0 {
                return Err(bad(format!(
                    "{} bytes is not a whole number of {}-byte rows",
                    data.len(),
                    row_len
                )));
            }
            let mut out = data;
            for row in out.chunks_exact_mut(row_len) {
                for i in bpp..row_len {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(out)
        }
        10..=15 => {
            let stride = row_len + 1;
            if data.len() % stride != 0 {
                return Err(bad(format!(
                    "{} bytes is not a whole number of {}-byte PNG rows",
                    data.len(),
                    stride
                )));
            }

            let mut out = Vec::with_capacity(data.len() / stride * row_len);
            let mut prev = vec![0u8; row_len];
            for chunk in data.chunks_exact(stride) {
                let tag = chunk[0];
                let mut row = chunk[1..].to_vec();
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prev[i];
                    let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                    let predicted = match tag {
                        0 => 0,
                        1 => left,
                        2 => up,
                        3 => ((left as u16 + up as u16) / 2) as u8,
                        4 => paeth(left, up, up_left),
                        t => return Err(bad(format!("invalid PNG row filter {}", t))),
                    };
                    row[i] = row[i].wrapping_add(predicted);
                }
                out.extend_from_slice(&row);
                prev = row;
            }
            Ok(out)
        }
        other => Err(bad(format!("unsupported predictor {}", other))),
    }
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i16 + up as i16 - up_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - up as i16).abs();
    let pc = (p - up_left as i16).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - px[3] as u16;
    let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}
