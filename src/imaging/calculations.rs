//! Pure calculation functions for image geometry, overlay layout and GPS
//! number encoding.
//!
//! All functions here are pure and testable without any I/O or images.

/// Aspect ratios below this distance from the target are left uncropped.
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// Target aspect ratio (width, height) for a frame of the given dimensions.
///
/// Portrait frames (`height > width`) target 9:16, everything else 16:9.
pub fn target_aspect(width: u32, height: u32) -> (u32, u32) {
    if height > width { (9, 16) } else { (16, 9) }
}

/// A crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centered crop that brings `(width, height)` to its target
/// aspect ratio.
///
/// Returns `None` when the frame is already within `tolerance` of the
/// target, so callers can hand the input back untouched. The crop only
/// ever removes pixels from the longer axis; nothing is upscaled.
///
/// # Examples
/// ```
/// # use gdr_cam::imaging::calculate_aspect_crop;
/// // 4:3 landscape → 16:9 by trimming top and bottom
/// let crop = calculate_aspect_crop(1600, 1200, 0.01).unwrap();
/// assert_eq!((crop.width, crop.height), (1600, 900));
/// assert_eq!((crop.x, crop.y), (0, 150));
///
/// // Already 16:9
/// assert_eq!(calculate_aspect_crop(1920, 1080, 0.01), None);
/// ```
pub fn calculate_aspect_crop(width: u32, height: u32, tolerance: f64) -> Option<CropRect> {
    if width == 0 || height == 0 {
        return None;
    }
    let (tw, th) = target_aspect(width, height);
    let target = tw as f64 / th as f64;
    let current = width as f64 / height as f64;

    if (current - target).abs() < tolerance {
        return None;
    }

    if current > target {
        // Too wide: keep full height, trim the sides
        let w = ((height as f64 * tw as f64 / th as f64).round() as u32).clamp(1, width);
        Some(CropRect {
            x: (width - w) / 2,
            y: 0,
            width: w,
            height,
        })
    } else {
        // Too tall: keep full width, trim top and bottom
        let h = ((width as f64 * th as f64 / tw as f64).round() as u32).clamp(1, height);
        Some(CropRect {
            x: 0,
            y: (height - h) / 2,
            width,
            height: h,
        })
    }
}

/// Dimensions after rotating by a multiple of 90 degrees.
pub fn rotated_dimensions(dims: (u32, u32), quarter_turns: u8) -> (u32, u32) {
    if quarter_turns % 2 == 1 {
        (dims.1, dims.0)
    } else {
        dims
    }
}

/// Overlay font size in pixels: `height * scale`, floored, then clamped.
pub fn overlay_font_size(height: u32, scale: f64, min_px: u32, max_px: u32) -> u32 {
    let raw = (height as f64 * scale).floor() as u32;
    raw.clamp(min_px, max_px.max(min_px))
}

/// Overlay edge padding: `min(25, w * 0.02, h * 0.02)`.
pub fn overlay_padding(width: u32, height: u32) -> f32 {
    25.0_f64
        .min(width as f64 * 0.02)
        .min(height as f64 * 0.02) as f32
}

/// Stroke width for outlined overlay text.
pub fn overlay_stroke_width(font_px: u32) -> u32 {
    (font_px / 20).max(1)
}

/// Degrees/minutes/seconds decomposition of a coordinate magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
}

/// Split a coordinate into truncated degrees and minutes plus fractional
/// seconds. The sign is dropped; hemisphere is carried separately.
///
/// ```
/// # use gdr_cam::imaging::to_dms;
/// let dms = to_dms(-23.5505);
/// assert_eq!((dms.degrees, dms.minutes), (23, 33));
/// assert!((dms.seconds - 1.8).abs() < 1e-6);
/// ```
pub fn to_dms(value: f64) -> Dms {
    let magnitude = value.abs();
    let degrees = magnitude.floor();
    let minutes_frac = (magnitude - degrees) * 60.0;
    let minutes = minutes_frac.floor();
    let seconds = (minutes_frac - minutes) * 60.0;
    Dms {
        degrees: degrees as u32,
        minutes: minutes as u32,
        seconds,
    }
}

/// Recombine DMS components into a non-negative decimal magnitude.
pub fn from_dms(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Encode a non-negative value as an unsigned rational with the given
/// denominator: `(round(|value| * denominator), denominator)`.
///
/// When the numerator would not fit in 32 bits the denominator is divided
/// by ten until it does, so very large inputs lose fractional precision
/// instead of wrapping. At denominator 1 the numerator saturates.
///
/// ```
/// # use gdr_cam::imaging::fixed_point;
/// assert_eq!(fixed_point(12.5, 100), (1250, 100));
/// assert_eq!(fixed_point(5000.0, 1_000_000), (500_000_000, 100_000));
/// ```
pub fn fixed_point(value: f64, denominator: u32) -> (u32, u32) {
    let magnitude = if value.is_finite() { value.abs() } else { 0.0 };
    let mut denominator = denominator.max(1);
    loop {
        let scaled = (magnitude * denominator as f64).round();
        if scaled <= u32::MAX as f64 {
            return (scaled as u32, denominator);
        }
        if denominator == 1 {
            return (u32::MAX, 1);
        }
        denominator /= 10;
    }
}

/// Value of an unsigned rational, `None` for a zero denominator.
pub fn rational_value((numerator, denominator): (u32, u32)) -> Option<f64> {
    (denominator != 0).then(|| numerator as f64 / denominator as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // target_aspect / calculate_aspect_crop
    // =========================================================================

    #[test]
    fn portrait_targets_nine_sixteen() {
        assert_eq!(target_aspect(1080, 1920), (9, 16));
        assert_eq!(target_aspect(3000, 4000), (9, 16));
    }

    #[test]
    fn landscape_and_square_target_sixteen_nine() {
        assert_eq!(target_aspect(1920, 1080), (16, 9));
        assert_eq!(target_aspect(1000, 1000), (16, 9));
    }

    #[test]
    fn crop_portrait_four_three() {
        // 3000x4000 (0.75) is wider than 9:16 (0.5625): trim sides
        let crop = calculate_aspect_crop(3000, 4000, ASPECT_TOLERANCE).unwrap();
        assert_eq!(crop.height, 4000);
        assert_eq!(crop.width, 2250);
        assert_eq!(crop.x, 375);
        assert_eq!(crop.y, 0);
    }

    #[test]
    fn crop_square_to_landscape() {
        let crop = calculate_aspect_crop(1000, 1000, ASPECT_TOLERANCE).unwrap();
        assert_eq!((crop.width, crop.height), (1000, 563));
        assert_eq!(crop.y, 218);
    }

    #[test]
    fn crop_very_wide_panorama() {
        let crop = calculate_aspect_crop(4000, 1000, ASPECT_TOLERANCE).unwrap();
        assert_eq!((crop.width, crop.height), (1778, 1000));
        assert_eq!(crop.x, 1111);
    }

    #[test]
    fn crop_within_tolerance_is_none() {
        assert_eq!(calculate_aspect_crop(1080, 1920, ASPECT_TOLERANCE), None);
        // 1.7733 vs 1.7778: inside tolerance
        assert_eq!(calculate_aspect_crop(1596, 900, ASPECT_TOLERANCE), None);
    }

    #[test]
    fn crop_result_is_stable() {
        for (w, h) in [(3000, 4000), (1000, 1000), (4000, 1000), (640, 481)] {
            let crop = calculate_aspect_crop(w, h, ASPECT_TOLERANCE).unwrap();
            assert_eq!(
                calculate_aspect_crop(crop.width, crop.height, ASPECT_TOLERANCE),
                None,
                "second crop of {w}x{h} should be a no-op"
            );
        }
    }

    #[test]
    fn crop_zero_dimension_is_none() {
        assert_eq!(calculate_aspect_crop(0, 100, ASPECT_TOLERANCE), None);
    }

    // =========================================================================
    // rotation / overlay layout
    // =========================================================================

    #[test]
    fn rotated_dimensions_swap_on_odd_turns() {
        assert_eq!(rotated_dimensions((4, 3), 0), (4, 3));
        assert_eq!(rotated_dimensions((4, 3), 1), (3, 4));
        assert_eq!(rotated_dimensions((4, 3), 2), (4, 3));
        assert_eq!(rotated_dimensions((4, 3), 3), (3, 4));
    }

    #[test]
    fn font_size_clamped() {
        assert_eq!(overlay_font_size(100, 0.04, 20, 80), 20);
        assert_eq!(overlay_font_size(1000, 0.04, 20, 80), 40);
        assert_eq!(overlay_font_size(4000, 0.04, 20, 80), 80);
        // floor, not round
        assert_eq!(overlay_font_size(1049, 0.04, 20, 80), 41);
    }

    #[test]
    fn padding_is_min_of_three() {
        assert_eq!(overlay_padding(4000, 3000), 25.0);
        assert_eq!(overlay_padding(500, 1000), 10.0);
        assert_eq!(overlay_padding(1000, 400), 8.0);
    }

    #[test]
    fn stroke_width_floor_one() {
        assert_eq!(overlay_stroke_width(20), 1);
        assert_eq!(overlay_stroke_width(80), 4);
    }

    // =========================================================================
    // DMS / fixed point
    // =========================================================================

    #[test]
    fn dms_of_sao_paulo() {
        let lat = to_dms(-23.5505);
        assert_eq!(lat.degrees, 23);
        assert_eq!(lat.minutes, 33);
        let lng = to_dms(-46.6333);
        assert_eq!(lng.degrees, 46);
        assert_eq!(lng.minutes, 37);
    }

    #[test]
    fn dms_recombines() {
        for v in [0.0, 12.345678, -89.999999, 179.5, -0.000001] {
            let d = to_dms(v);
            let back = from_dms(d.degrees as f64, d.minutes as f64, d.seconds);
            assert!((back - v.abs()).abs() < 1e-9, "{v} → {back}");
        }
    }

    #[test]
    fn fixed_point_rounds() {
        assert_eq!(fixed_point(1.8, 1_000_000), (1_800_000, 1_000_000));
        assert_eq!(fixed_point(-12.0, 100), (1200, 100));
    }

    #[test]
    fn fixed_point_reduces_denominator_on_overflow() {
        // 8848.86 m * 1e6 overflows u32
        let (n, d) = fixed_point(8848.86, 1_000_000);
        assert_eq!(d, 100_000);
        assert_eq!(n, 884_886_000);
    }

    #[test]
    fn fixed_point_saturates_at_unit_denominator() {
        assert_eq!(fixed_point(1e12, 1_000_000), (u32::MAX, 1));
    }

    #[test]
    fn fixed_point_non_finite_is_zero() {
        assert_eq!(fixed_point(f64::NAN, 100), (0, 100));
    }

    #[test]
    fn rational_value_zero_denominator() {
        assert_eq!(rational_value((5, 0)), None);
        assert_eq!(rational_value((5, 2)), Some(2.5));
    }
}
