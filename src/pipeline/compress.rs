//! Image recompression: arbitrary image bytes → JPEG under a size budget.
//!
//! The image is decoded, downscaled once so neither side exceeds
//! `max_dimension` (never upscaled), flattened to RGB, and then JPEG-encoded
//! at decreasing quality until it fits the budget or the floor is reached.
//! The budget is best effort: if the floor quality still doesn't fit, that
//! encoding is returned.
//!
//! Flattening to RGB discards any alpha channel. JPEG has no transparency.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use tracing::debug;

/// Parameters of the quality search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionBudget {
    pub target_bytes: usize,
    pub max_dimension: u32,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

impl Default for CompressionBudget {
    fn default() -> Self {
        Self {
            target_bytes: 300 * 1024,
            max_dimension: 1920,
            start_quality: 95,
            quality_step: 5,
            min_quality: 10,
        }
    }
}

/// Result of [`compress`].
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    /// Quality of the returned encoding.
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    /// `bytes.len() <= target_bytes`.
    pub within_budget: bool,
}

/// Why [`compress`] failed.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("decode: {0}")]
    Decode(#[source] image::ImageError),
    #[error("encode: {0}")]
    Encode(#[source] image::ImageError),
}

/// Recompress `bytes` as JPEG within `budget`.
pub fn compress(bytes: &[u8], budget: &CompressionBudget) -> Result<CompressedImage, CompressError> {
    let img = image::load_from_memory(bytes).map_err(CompressError::Decode)?;
    let (orig_w, orig_h) = img.dimensions();

    let rgb = downscale(img, budget.max_dimension).to_rgb8();
    let (width, height) = rgb.dimensions();
    if (width, height) != (orig_w, orig_h) {
        debug!("Downscaled {}x{} → {}x{}", orig_w, orig_h, width, height);
    }

    let step = budget.quality_step.max(1);
    let floor = budget.min_quality.clamp(1, 100);
    let mut quality = budget.start_quality.clamp(floor, 100);

    loop {
        let encoded = encode_jpeg(&rgb, quality).map_err(CompressError::Encode)?;
        let fits = encoded.len() <= budget.target_bytes;
        let next = quality.saturating_sub(step);

        if fits || next < floor {
            debug!(
                "JPEG q={} → {} bytes (target {}, fits={})",
                quality,
                encoded.len(),
                budget.target_bytes,
                fits
            );
            return Ok(CompressedImage {
                bytes: encoded,
                quality,
                width,
                height,
                within_budget: fits,
            });
        }
        quality = next;
    }
}

/// Shrink so that neither side exceeds `max_dimension`, keeping aspect ratio.
fn downscale(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max_dimension && h <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

pub(crate) fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(rgb)?;
    Ok(buf)
}
