//! Shared test utilities for the gdr-cam test suite.
//!
//! Provides synthetic images (encoded in memory with the `image` crate),
//! a canonical São Paulo inspection record, and a throwaway on-disk store.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = tagged_jpeg(64, 36);            // carries sample_block()
//! let (_tmp, store) = temp_store();
//! let id = store.insert(jpeg, sample_metadata()).await.unwrap();
//! ```

use crate::imaging::MetadataBlock;
use crate::imaging::exif;
use crate::store::PhotoStore;
use crate::types::{GeoFix, InspectionMetadata};
use chrono::{NaiveDate, NaiveDateTime};
use image::{ImageEncoder, Rgb, RgbImage};
use img_parts::{Bytes, DynImage, ImageEXIF};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A small valid JPEG without any metadata.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A small valid PNG without any metadata.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A JPEG carrying [`sample_block`].
pub fn tagged_jpeg(width: u32, height: u32) -> Vec<u8> {
    exif::embed(&sample_jpeg(width, height), &sample_block()).unwrap()
}

/// A little-endian TIFF block as camera firmware writes it: Orientation = 6
/// plus a Make tag whose value offset points far past the payload.
pub fn camera_tiff_with_broken_make() -> Vec<u8> {
    let mut tiff = b"II\x2a\0\x08\0\0\0".to_vec();
    tiff.extend_from_slice(&2u16.to_le_bytes());
    // Make: ASCII, 20 bytes at 0x4000
    tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&20u32.to_le_bytes());
    tiff.extend_from_slice(&0x4000u32.to_le_bytes());
    // Orientation: SHORT 6, inline
    tiff.extend_from_slice(&exif::TAG_ORIENTATION.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&[6, 0, 0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

/// `jpeg` with `tiff` spliced in verbatim as its EXIF payload.
pub fn with_raw_exif(jpeg: &[u8], tiff: Vec<u8>) -> Vec<u8> {
    let mut container = DynImage::from_bytes(Bytes::copy_from_slice(jpeg))
        .unwrap()
        .unwrap();
    container.set_exif(Some(Bytes::from(tiff)));
    let mut out = Vec::new();
    container.encoder().write_to(&mut out).unwrap();
    out
}

// =========================================================================
// Canonical inspection data
// =========================================================================

/// Local capture time used by every sample: 2026-10-18 12:30:45.
pub fn sample_captured_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 18)
        .unwrap()
        .and_hms_opt(12, 30, 45)
        .unwrap()
}

/// São Paulo, ±12 m.
pub fn sample_fix() -> GeoFix {
    GeoFix::new(-23.5505, -46.6333, 12.0, 1_760_790_645_000)
}

pub fn sample_metadata() -> InspectionMetadata {
    InspectionMetadata {
        work_front: Some("Frente Norte".into()),
        coronation_value: Some("42".into()),
        activity_performed: Some("Inspeção de drenagem".into()),
        observation_category: Some("Conformidade".into()),
        location: Some(sample_fix()),
        recorded_at: "18/10/2026 12:30:45".into(),
    }
}

pub fn sample_block() -> MetadataBlock {
    exif::encode(&sample_metadata(), sample_captured_at()).unwrap()
}

// =========================================================================
// Store
// =========================================================================

/// A fresh store in its own temp directory. Keep the `TempDir` alive for
/// the duration of the test.
pub fn temp_store() -> (TempDir, PhotoStore) {
    let tmp = TempDir::new().unwrap();
    let store = PhotoStore::open(&tmp.path().join("photos.sqlite3")).unwrap();
    (tmp, store)
}
