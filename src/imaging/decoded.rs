//! Decoded image handle shared between the caches and display surfaces.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::{CacheError, Result};

/// Side length of the placeholder image in pixels.
pub const PLACEHOLDER_SIZE: u32 = 8;

const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([0xd0, 0xd0, 0xd0, 0xff]);

/// A decoded bitmap held in process memory.
///
/// Cloning is cheap: clones share the same pixel buffer.
#[derive(Clone)]
pub struct DecodedImage {
    inner: Arc<DynamicImage>,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            inner: Arc::new(image),
        }
    }

    /// The "no image" result shown when a load cannot produce a real image.
    pub fn placeholder() -> Self {
        let pixels = RgbaImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, PLACEHOLDER_COLOR);
        Self::new(DynamicImage::ImageRgba8(pixels))
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Bytes occupied by the pixel buffer.
    pub fn byte_size(&self) -> u64 {
        self.inner.as_bytes().len() as u64
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }

    /// True when both handles point at the same pixel buffer.
    pub fn same_as(&self, other: &DecodedImage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Encodes the image losslessly as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.inner
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CacheError::Decode(format!("PNG encoding failed: {}", e)))?;
        Ok(buf.into_inner())
    }
}

impl From<DynamicImage> for DecodedImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bytes", &self.byte_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_rgba() {
        let image = DecodedImage::new(DynamicImage::new_rgba8(10, 5));
        assert_eq!(image.byte_size(), 10 * 5 * 4);
        assert_eq!(image.width(), 10);
        assert_eq!(image.height(), 5);
    }

    #[test]
    fn test_placeholder_dimensions() {
        let placeholder = DecodedImage::placeholder();
        assert_eq!(placeholder.width(), PLACEHOLDER_SIZE);
        assert_eq!(placeholder.height(), PLACEHOLDER_SIZE);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let image = DecodedImage::new(DynamicImage::new_rgb8(2, 2));
        let clone = image.clone();
        assert!(image.same_as(&clone));
        assert!(!image.same_as(&DecodedImage::new(DynamicImage::new_rgb8(2, 2))));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = DecodedImage::placeholder().encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
