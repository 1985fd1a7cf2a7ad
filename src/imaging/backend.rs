//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the three pixel-level operations the
//! transform engine needs: identify, decode and encode. Everything above it
//! (rotation, cropping, overlay drawing, metadata re-attachment) works on
//! decoded buffers and lives in [`operations`](super::operations).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests swap in the
//! `MockBackend` below to exercise failure paths without crafting broken
//! image files.

use super::params::Quality;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codec backends.
///
/// Inputs and outputs are encoded bytes so the rest of the crate never
/// touches files: photos live in the store and travel over channels.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions from the container header without a full decode.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode to a pixel buffer.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Encode a pixel buffer as JPEG.
    fn encode_jpeg(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError>;
}
