//! High-level image operations.
//!
//! Every operation takes encoded bytes and returns encoded JPEG bytes. The
//! pattern is the same throughout:
//!
//! 1. decode pixels through the [`ImageBackend`] (undecodable input fails here),
//! 2. read the existing metadata block,
//! 3. transform the pixels,
//! 4. encode and re-attach the block unchanged.
//!
//! Pixel codecs drop EXIF on re-encode, so step 4 is what keeps GPS and the
//! inspection record attached across a rotate or an overlay burn.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{ASPECT_TOLERANCE, calculate_aspect_crop, rotated_dimensions};
use super::exif::{self, CodecError, MetadataBlock};
use super::overlay::{OverlayError, OverlayText, draw_overlay, format_gps_line};
use super::params::{InvalidAngle, OverlayStyle, Quality, RotateAngle};
use crate::types::GeoFix;
use image::DynamicImage;
use image::metadata::Orientation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("metadata: {0}")]
    Metadata(#[from] CodecError),
    #[error("overlay: {0}")]
    Overlay(#[from] OverlayError),
    #[error("{0}")]
    InvalidAngle(InvalidAngle),
}

impl From<BackendError> for TransformError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Decode(msg) => TransformError::Decode(msg),
            BackendError::Encode(msg) => TransformError::Encode(msg),
        }
    }
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Encoding and layout knobs shared by all operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    pub quality: Quality,
    pub overlay: OverlayStyle,
    pub aspect_tolerance: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            overlay: OverlayStyle::default(),
            aspect_tolerance: ASPECT_TOLERANCE,
        }
    }
}

/// Decode pixels, then the metadata block. Pixels go first so that garbage
/// input reports as a decode failure rather than a container error.
fn open(backend: &impl ImageBackend, bytes: &[u8]) -> Result<(DynamicImage, MetadataBlock)> {
    let img = backend.decode(bytes)?;
    let block = exif::decode(bytes)?;
    Ok((img, block))
}

/// Encode as JPEG and re-attach `block`. An empty block is not written.
fn finish(
    backend: &impl ImageBackend,
    img: &DynamicImage,
    block: &MetadataBlock,
    quality: Quality,
) -> Result<Vec<u8>> {
    let encoded = backend.encode_jpeg(img, quality)?;
    if block.is_empty() {
        return Ok(encoded);
    }
    Ok(exif::embed(&encoded, block)?)
}

fn rotate_pixels(img: DynamicImage, angle: RotateAngle) -> DynamicImage {
    match angle.quarter_turns() {
        1 => img.rotate90(),
        2 => img.rotate180(),
        3 => img.rotate270(),
        _ => img,
    }
}

/// Rotate by a multiple of 90 degrees; positive is clockwise.
///
/// Width and height swap for quarter and three-quarter turns. No pixels are
/// cropped. Angles other than `-270..=270` in steps of 90 are rejected.
pub fn rotate(
    backend: &impl ImageBackend,
    bytes: &[u8],
    degrees: i32,
    config: &TransformConfig,
) -> Result<Vec<u8>> {
    let angle = RotateAngle::new(degrees).map_err(TransformError::InvalidAngle)?;
    let (img, block) = open(backend, bytes)?;
    let expected = rotated_dimensions((img.width(), img.height()), angle.quarter_turns());
    let rotated = rotate_pixels(img, angle);
    debug_assert_eq!((rotated.width(), rotated.height()), expected);
    finish(backend, &rotated, &block, config.quality)
}

/// Center-crop to 9:16 (portrait) or 16:9 (landscape/square).
///
/// Input already within tolerance of its target is returned byte-for-byte,
/// which makes the operation idempotent.
pub fn crop_to_aspect_ratio(
    backend: &impl ImageBackend,
    bytes: &[u8],
    config: &TransformConfig,
) -> Result<Vec<u8>> {
    let dims = backend.identify(bytes)?;
    let Some(rect) = calculate_aspect_crop(dims.width, dims.height, config.aspect_tolerance)
    else {
        return Ok(bytes.to_vec());
    };
    let (img, block) = open(backend, bytes)?;
    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
    finish(backend, &cropped, &block, config.quality)
}

/// Apply the EXIF orientation tag to the pixels and drop the tag.
///
/// Raw camera captures are often stored sideways with an orientation hint;
/// everything downstream assumes upright pixels.
pub fn apply_orientation(
    backend: &impl ImageBackend,
    bytes: &[u8],
    config: &TransformConfig,
) -> Result<Vec<u8>> {
    let (mut img, mut block) = open(backend, bytes)?;
    let Some(tag) = block.image.orientation.take() else {
        return Ok(bytes.to_vec());
    };
    if let Some(orientation) = u8::try_from(tag).ok().and_then(Orientation::from_exif) {
        img.apply_orientation(orientation);
    }
    finish(backend, &img, &block, config.quality)
}

/// Resolve the overlay text for an image.
///
/// The image's own block wins: coordinates and accuracy come from its GPS
/// group and the timestamp from DateTimeOriginal. `fallback_fix` and
/// `fallback_timestamp` are used only for what the block lacks.
pub fn overlay_text(
    block: &MetadataBlock,
    fallback_fix: Option<&GeoFix>,
    fallback_timestamp: &str,
) -> OverlayText {
    let from_block = block.gps.as_ref().and_then(|g| {
        let coords = (g.latitude_degrees()?, g.longitude_degrees()?);
        Some((coords, g.accuracy_meters()))
    });
    let (coords, accuracy) = match (from_block, fallback_fix) {
        (Some((coords, acc)), _) => (Some(coords), acc),
        (None, Some(fix)) => (
            Some((fix.latitude, fix.longitude)),
            Some(fix.accuracy_meters),
        ),
        (None, None) => (None, None),
    };

    OverlayText {
        gps_line: format_gps_line(coords, accuracy),
        timestamp: block
            .photo
            .date_time_original
            .clone()
            .unwrap_or_else(|| fallback_timestamp.to_string()),
    }
}

fn burn(
    img: DynamicImage,
    block: &MetadataBlock,
    fallback_fix: Option<&GeoFix>,
    fallback_timestamp: &str,
    style: &OverlayStyle,
) -> Result<DynamicImage> {
    let text = overlay_text(block, fallback_fix, fallback_timestamp);
    let mut canvas = img.to_rgba8();
    draw_overlay(&mut canvas, &text, style)?;
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Burn the north arrow, GPS line and timestamp into the pixels.
pub fn burn_overlay(
    backend: &impl ImageBackend,
    bytes: &[u8],
    fallback_fix: Option<&GeoFix>,
    fallback_timestamp: &str,
    config: &TransformConfig,
) -> Result<Vec<u8>> {
    let (img, block) = open(backend, bytes)?;
    let burned = burn(img, &block, fallback_fix, fallback_timestamp, &config.overlay)?;
    finish(backend, &burned, &block, config.quality)
}

/// Export rendition: `rotate(0)` followed by [`burn_overlay`], done with a
/// single decode/encode cycle.
pub fn render_export(
    backend: &impl ImageBackend,
    bytes: &[u8],
    fallback_timestamp: &str,
    config: &TransformConfig,
) -> Result<Vec<u8>> {
    let (img, block) = open(backend, bytes)?;
    let upright = rotate_pixels(img, RotateAngle::NONE);
    let burned = burn(upright, &block, None, fallback_timestamp, &config.overlay)?;
    finish(backend, &burned, &block, config.quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{
        camera_tiff_with_broken_make, sample_block, sample_jpeg, sample_png, tagged_jpeg,
        with_raw_exif,
    };

    fn dims(bytes: &[u8]) -> (u32, u32) {
        let d = RustBackend::new().identify(bytes).unwrap();
        (d.width, d.height)
    }

    // =========================================================================
    // rotate
    // =========================================================================

    #[test]
    fn rotate_quarter_swaps_dimensions_and_keeps_metadata() {
        let input = tagged_jpeg(64, 36);
        let out = rotate(&RustBackend::new(), &input, 90, &TransformConfig::default()).unwrap();
        assert_eq!(dims(&out), (36, 64));
        assert_eq!(exif::decode(&out).unwrap(), sample_block());
    }

    #[test]
    fn rotate_there_and_back() {
        let backend = RustBackend::new();
        let config = TransformConfig::default();
        let input = tagged_jpeg(80, 45);
        let turned = rotate(&backend, &input, 90, &config).unwrap();
        let back = rotate(&backend, &turned, -90, &config).unwrap();
        assert_eq!(dims(&back), (80, 45));
        assert_eq!(exif::decode(&back).unwrap(), exif::decode(&input).unwrap());
    }

    #[test]
    fn rotate_half_turn_keeps_dimensions() {
        let out = rotate(
            &RustBackend::new(),
            &sample_jpeg(30, 20),
            -180,
            &TransformConfig::default(),
        )
        .unwrap();
        assert_eq!(dims(&out), (30, 20));
    }

    #[test]
    fn rotate_rejects_odd_angle() {
        let result = rotate(
            &RustBackend::new(),
            &sample_jpeg(8, 8),
            45,
            &TransformConfig::default(),
        );
        assert!(matches!(result, Err(TransformError::InvalidAngle(_))));
    }

    #[test]
    fn rotate_garbage_is_decode_error() {
        let result = rotate(
            &RustBackend::new(),
            b"not an image",
            90,
            &TransformConfig::default(),
        );
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn rotate_encodes_at_configured_quality() {
        let backend = MockBackend::new();
        let config = TransformConfig {
            quality: Quality::new(70),
            ..TransformConfig::default()
        };
        rotate(&backend, &sample_jpeg(10, 20), 270, &config).unwrap();
        assert!(backend.get_operations().contains(&RecordedOp::EncodeJpeg {
            width: 20,
            height: 10,
            quality: 70
        }));
    }

    #[test]
    fn png_input_becomes_jpeg() {
        let out = rotate(
            &RustBackend::new(),
            &sample_png(10, 10),
            0,
            &TransformConfig::default(),
        )
        .unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    // =========================================================================
    // crop_to_aspect_ratio
    // =========================================================================

    #[test]
    fn crop_landscape_to_sixteen_nine() {
        let input = tagged_jpeg(160, 120);
        let out = crop_to_aspect_ratio(&RustBackend::new(), &input, &TransformConfig::default())
            .unwrap();
        assert_eq!(dims(&out), (160, 90));
        assert_eq!(exif::decode(&out).unwrap(), sample_block());
    }

    #[test]
    fn crop_portrait_to_nine_sixteen() {
        let out = crop_to_aspect_ratio(
            &RustBackend::new(),
            &sample_jpeg(120, 160),
            &TransformConfig::default(),
        )
        .unwrap();
        assert_eq!(dims(&out), (90, 160));
    }

    #[test]
    fn crop_is_idempotent() {
        let backend = RustBackend::new();
        let config = TransformConfig::default();
        let once = crop_to_aspect_ratio(&backend, &sample_jpeg(100, 100), &config).unwrap();
        let twice = crop_to_aspect_ratio(&backend, &once, &config).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn crop_within_tolerance_returns_input() {
        let input = sample_jpeg(160, 90);
        let out =
            crop_to_aspect_ratio(&RustBackend::new(), &input, &TransformConfig::default()).unwrap();
        assert_eq!(out, input);
    }

    // =========================================================================
    // apply_orientation
    // =========================================================================

    #[test]
    fn orientation_six_turns_upright_and_drops_tag() {
        let mut block = sample_block();
        block.image.orientation = Some(6);
        let input = exif::embed(&sample_jpeg(40, 20), &block).unwrap();

        let out =
            apply_orientation(&RustBackend::new(), &input, &TransformConfig::default()).unwrap();
        assert_eq!(dims(&out), (20, 40));
        let after = exif::decode(&out).unwrap();
        assert_eq!(after.image.orientation, None);
        assert_eq!(after.gps, block.gps);
    }

    #[test]
    fn camera_block_with_broken_vendor_tag_still_orients() {
        let input = with_raw_exif(&sample_jpeg(40, 20), camera_tiff_with_broken_make());
        let out =
            apply_orientation(&RustBackend::new(), &input, &TransformConfig::default()).unwrap();
        assert_eq!(dims(&out), (20, 40));
        assert_eq!(exif::decode(&out).unwrap().image.orientation, None);
    }

    #[test]
    fn no_orientation_tag_is_passthrough() {
        let input = tagged_jpeg(20, 10);
        let out =
            apply_orientation(&RustBackend::new(), &input, &TransformConfig::default()).unwrap();
        assert_eq!(out, input);
    }

    // =========================================================================
    // overlay
    // =========================================================================

    #[test]
    fn overlay_text_prefers_image_metadata() {
        let block = sample_block();
        let other = GeoFix::new(10.0, 20.0, 3.0, 0);
        let text = overlay_text(&block, Some(&other), "fallback");
        assert_eq!(
            text.gps_line,
            "N 23.550500\u{b0} S, 46.633300\u{b0} W (\u{b1}12.0m)"
        );
        assert_eq!(text.timestamp, "2026:10:18 12:30:45");
    }

    #[test]
    fn overlay_text_falls_back() {
        let fix = GeoFix::new(10.0, 20.0, 3.0, 0);
        let text = overlay_text(&MetadataBlock::default(), Some(&fix), "18/10/2026 09:00");
        assert_eq!(text.gps_line, "N 10.000000\u{b0} N, 20.000000\u{b0} E (\u{b1}3.0m)");
        assert_eq!(text.timestamp, "18/10/2026 09:00");
    }

    #[test]
    fn burn_overlay_keeps_dimensions_and_metadata() {
        let input = tagged_jpeg(320, 180);
        let out = burn_overlay(
            &RustBackend::new(),
            &input,
            None,
            "unused",
            &TransformConfig::default(),
        )
        .unwrap();
        assert_eq!(dims(&out), (320, 180));
        assert_eq!(exif::decode(&out).unwrap(), sample_block());
        assert_ne!(out, input);
    }

    #[test]
    fn burn_overlay_decode_failure() {
        let result = burn_overlay(
            &MockBackend::failing(),
            &sample_jpeg(10, 10),
            None,
            "x",
            &TransformConfig::default(),
        );
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn render_export_keeps_metadata() {
        let input = tagged_jpeg(200, 120);
        let out = render_export(&RustBackend::new(), &input, "x", &TransformConfig::default())
            .unwrap();
        assert_eq!(dims(&out), (200, 120));
        assert_eq!(exif::decode(&out).unwrap(), sample_block());
    }
}
