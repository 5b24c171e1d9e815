//! Byte-to-image decoding with power-of-two downsampling.

use image::imageops::FilterType;

use crate::error::{CacheError, Result};
use crate::imaging::DecodedImage;

/// Turns fetched bytes into an in-memory image no larger than needed.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8], max_width: u32, max_height: u32) -> Result<DecodedImage>;
}

// == Sample Size ==
/// Largest power-of-two divisor that keeps both dimensions at or above the
/// requested bounding box. Never upscales; a zero bound disables sampling.
pub fn sample_size(width: u32, height: u32, max_width: u32, max_height: u32) -> u32 {
    if max_width == 0 || max_height == 0 {
        return 1;
    }

    let mut sample = 1;
    if width > max_width || height > max_height {
        let half_width = width / 2;
        let half_height = height / 2;
        while half_width / sample >= max_width && half_height / sample >= max_height {
            sample *= 2;
        }
    }
    sample
}

/// Decoder backed by the `image` crate's format sniffing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampledDecoder;

impl Decoder for SampledDecoder {
    fn decode(&self, bytes: &[u8], max_width: u32, max_height: u32) -> Result<DecodedImage> {
        let image = image::load_from_memory(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;

        let sample = sample_size(image.width(), image.height(), max_width, max_height);
        if sample == 1 {
            return Ok(DecodedImage::new(image));
        }

        let width = (image.width() / sample).max(1);
        let height = (image.height() / sample).max(1);
        Ok(DecodedImage::new(
            image.resize_exact(width, height, FilterType::Triangle),
        ))
    }
}
