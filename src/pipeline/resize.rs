//! Thumbnail scaling and JPEG encoding.
//!
//! Two modes, selected by [`SizeBounds::height`]:
//!
//! * **width-only**: scale so the output is exactly `width` pixels wide and
//!   the height follows the source aspect ratio.
//! * **bounding-box**: pick a uniform scale from the source shape, then clamp
//!   it so neither side exceeds the box. One side may under-fill.
//!
//! Everything here is pure: the same bytes and bounds always give the same
//! output, which is what the tests rely on.

use crate::config::SizeBounds;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use std::path::Path;
use tracing::debug;

/// A scaled, JPEG-encoded raster.
#[derive(Debug, Clone)]
pub struct ScaledImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Output dimensions for a `src_width × src_height` source under `bounds`.
///
/// Never returns a zero side.
pub fn scaled_dimensions(src_width: u32, src_height: u32, bounds: SizeBounds) -> (u32, u32) {
    let (w, h) = (src_width.max(1) as f64, src_height.max(1) as f64);
    let max_width = bounds.width.max(1) as f64;
    let width_ratio = w / max_width;

    let Some(max_height) = bounds.height else {
        let height = (h / width_ratio).round().max(1.0) as u32;
        return (bounds.width.max(1), height);
    };
    let max_height = max_height.max(1) as f64;

    let scale = if w / h > width_ratio {
        max_width / w
    } else {
        max_height / h
    };
    let scale = scale.min(max_width / w).min(max_height / h);

    let width = ((w * scale).round() as u32).clamp(1, max_width as u32);
    let height = ((h * scale).round() as u32).clamp(1, max_height as u32);
    (width, height)
}

/// Scale `source` into `bounds` and encode it as JPEG.
pub fn resize(
    source: &DynamicImage,
    bounds: SizeBounds,
    quality: u8,
) -> Result<ScaledImage, ImageError> {
    let (width, height) = scaled_dimensions(source.width(), source.height(), bounds);
    let scaled = source.resize_exact(width, height, FilterType::Lanczos3);
    let bytes = encode_jpeg(&scaled, quality)?;
    debug!(
        "Scaled {}x{} → {}x{} ({} bytes)",
        source.width(),
        source.height(),
        width,
        height,
        bytes.len()
    );
    Ok(ScaledImage {
        width,
        height,
        bytes,
    })
}

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::with_capacity(jpeg_capacity_hint(rgb.width(), rgb.height()));
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Rough JPEG output size: a quarter of the pixel count.
fn jpeg_capacity_hint(width: u32, height: u32) -> usize {
    width as usize * height as usize / 4
}

/// Decode an image file, sniffing the format from its content.
pub fn open_image(path: &Path) -> Result<DynamicImage, ImageError> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}
