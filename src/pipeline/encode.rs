//! Image normalisation: decode → flatten alpha → downsample → JPEG.
//!
//! Every picture stored in the workbook is a baseline RGB JPEG whose longest
//! side is at most `max_dimension`. Transparent pixels are composited over
//! white because JPEG has no alpha channel and Excel renders sheets on a
//! white background.

use crate::error::FetchError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use tracing::debug;

/// A re-encoded picture ready to anchor in a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// JPEG bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Size of the downloaded original.
    pub source_width: u32,
    pub source_height: u32,
}

/// Decode `bytes`, normalise colour, bound the size and re-encode as JPEG.
///
/// CPU-bound; call from `spawn_blocking` inside async code.
pub fn prepare_image(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<EncodedImage, FetchError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| FetchError::Decode {
        detail: e.to_string(),
    })?;
    let (source_width, source_height) = (decoded.width(), decoded.height());

    let rgb = flatten_alpha(decoded);
    let (width, height) = fit_within(source_width, source_height, max_dimension);
    let rgb = if (width, height) != (source_width, source_height) {
        imageops::resize(&rgb, width, height, FilterType::Lanczos3)
    } else {
        rgb
    };

    let data = encode_jpeg(&rgb, quality)?;
    debug!(
        "Prepared image {}x{} → {}x{} JPEG, {} bytes",
        source_width,
        source_height,
        width,
        height,
        data.len()
    );

    Ok(EncodedImage {
        data,
        width,
        height,
        source_width,
        source_height,
    })
}

/// Drop the alpha channel by compositing over white; opaque images convert directly.
pub fn flatten_alpha(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Largest size with the same aspect ratio whose sides are both ≤ `max`.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max || longest == 0 {
        return (width, height);
    }
    let scale = max as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

/// Encode an RGB buffer as JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(img)
        .map_err(|e| FetchError::Encode {
            detail: e.to_string(),
        })?;
    Ok(buf)
}
