//! Pure Rust image codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image::load_from_memory` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! JPEG has no alpha channel, so buffers are flattened to RGB8 before encoding.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(format!("Failed to sniff format: {}", e)))?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let rgb = image.to_rgb8();
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.value());
        rgb.write_with_encoder(encoder)
            .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {}", e)))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_jpeg, sample_png};

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend.identify(&sample_jpeg(200, 150)).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_png() {
        let dims = RustBackend::new().identify(&sample_png(30, 60)).unwrap();
        assert_eq!((dims.width, dims.height), (30, 60));
    }

    #[test]
    fn identify_garbage_errors() {
        let result = RustBackend::new().identify(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_garbage_errors() {
        let result = RustBackend::new().decode(&[0xFF, 0xD8, 0xFF, 0x00]);
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn encode_jpeg_flattens_alpha() {
        let rgba = DynamicImage::new_rgba8(20, 10);
        let backend = RustBackend::new();
        let bytes = backend.encode_jpeg(&rgba, Quality::default()).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let dims = backend.identify(&bytes).unwrap();
        assert_eq!((dims.width, dims.height), (20, 10));
    }
}
