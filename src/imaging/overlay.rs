//! Burned-in evidence overlay: north arrow, GPS line and timestamp.
//!
//! Layout, all anchored to the bottom of the frame:
//!
//! ```text
//!                       ▲                     (arrow, bottom at north_y - padding)
//!     N 23.550500° S, 46.633300° W (±12.0m)   (centered, bottom at north_y + padding)
//!                                 2026:10:18 12:30:45   (right-aligned, bottom at h - padding)
//! ```
//!
//! where `north_y = height - font_px * 0.8`. Text is drawn as a black
//! outline followed by a white fill so it stays legible on any background.
//! The font is DejaVu Sans Bold, embedded in the binary.

use super::calculations::{overlay_font_size, overlay_padding, overlay_stroke_width};
use super::params::OverlayStyle;
use ab_glyph::{FontRef, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use thiserror::Error;

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("embedded overlay font is invalid: {0}")]
    Font(String),
}

/// The two text lines drawn onto a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
    pub gps_line: String,
    pub timestamp: String,
}

/// Format the coordinate line: `N {lat}° {ref}, {lng}° {ref}`, six decimals,
/// with ` (±{acc}m)` appended when the accuracy is known. Without
/// coordinates the line is a bare `N`.
pub fn format_gps_line(coords: Option<(f64, f64)>, accuracy_meters: Option<f64>) -> String {
    let Some((lat, lng)) = coords else {
        return "N".to_string();
    };
    let lat_ref = if lat < 0.0 { 'S' } else { 'N' };
    let lng_ref = if lng < 0.0 { 'W' } else { 'E' };
    let mut line = format!(
        "N {:.6}\u{b0} {}, {:.6}\u{b0} {}",
        lat.abs(),
        lat_ref,
        lng.abs(),
        lng_ref
    );
    if let Some(acc) = accuracy_meters {
        line.push_str(&format!(" (\u{b1}{:.1}m)", acc));
    }
    line
}

/// Draw the overlay onto `canvas` in place.
pub fn draw_overlay(
    canvas: &mut RgbaImage,
    text: &OverlayText,
    style: &OverlayStyle,
) -> Result<(), OverlayError> {
    let font = FontRef::try_from_slice(FONT_BYTES).map_err(|e| OverlayError::Font(e.to_string()))?;
    let (width, height) = canvas.dimensions();

    let font_px = overlay_font_size(height, style.font_scale, style.min_font_px, style.max_font_px);
    let padding = overlay_padding(width, height);
    let stroke = overlay_stroke_width(font_px) as i32;
    let scale = PxScale::from(font_px as f32);

    let center_x = width as f32 / 2.0;
    let north_y = height as f32 - font_px as f32 * 0.8;

    draw_north_arrow(canvas, center_x, north_y - padding, font_px as f32, stroke);

    let (gps_w, gps_h) = text_size(scale, &font, &text.gps_line);
    let gps_x = (center_x - gps_w as f32 / 2.0) as i32;
    let gps_y = (north_y + padding) as i32 - gps_h as i32;
    draw_outlined_text(canvas, gps_x, gps_y, scale, &font, &text.gps_line, stroke);

    let (ts_w, ts_h) = text_size(scale, &font, &text.timestamp);
    let ts_x = (width as f32 - padding) as i32 - ts_w as i32;
    let ts_y = (height as f32 - padding) as i32 - ts_h as i32;
    draw_outlined_text(canvas, ts_x, ts_y, scale, &font, &text.timestamp, stroke);

    Ok(())
}

fn draw_outlined_text(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    scale: PxScale,
    font: &FontRef,
    text: &str,
    stroke: i32,
) {
    for dy in -stroke..=stroke {
        for dx in -stroke..=stroke {
            if dx != 0 || dy != 0 {
                draw_text_mut(canvas, OUTLINE, x + dx, y + dy, scale, font, text);
            }
        }
    }
    draw_text_mut(canvas, FILL, x, y, scale, font, text);
}

/// Upward arrow one font-size tall, its base at `bottom`.
fn draw_north_arrow(canvas: &mut RgbaImage, center_x: f32, bottom: f32, size: f32, stroke: i32) {
    let points = arrow_points(center_x, bottom, size);
    for dy in -stroke..=stroke {
        for dx in -stroke..=stroke {
            if dx != 0 || dy != 0 {
                let shifted: Vec<Point<i32>> =
                    points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect();
                draw_polygon_mut(canvas, &shifted, OUTLINE);
            }
        }
    }
    draw_polygon_mut(canvas, &points, FILL);
}

fn arrow_points(cx: f32, bottom: f32, size: f32) -> Vec<Point<i32>> {
    let top = bottom - size;
    let shoulder = top + size * 0.45;
    let head = size * 0.4;
    let shaft = (size * 0.15).max(1.0);
    [
        (cx, top),
        (cx + head, shoulder),
        (cx + shaft, shoulder),
        (cx + shaft, bottom),
        (cx - shaft, bottom),
        (cx - shaft, shoulder),
        (cx - head, shoulder),
    ]
    .iter()
    .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_line_southern_western() {
        let line = format_gps_line(Some((-23.5505, -46.6333)), Some(12.0));
        assert_eq!(line, "N 23.550500\u{b0} S, 46.633300\u{b0} W (\u{b1}12.0m)");
    }

    #[test]
    fn gps_line_without_accuracy() {
        let line = format_gps_line(Some((48.8584, 2.2945)), None);
        assert_eq!(line, "N 48.858400\u{b0} N, 2.294500\u{b0} E");
    }

    #[test]
    fn gps_line_without_coordinates() {
        assert_eq!(format_gps_line(None, Some(5.0)), "N");
    }

    #[test]
    fn embedded_font_parses() {
        assert!(FontRef::try_from_slice(FONT_BYTES).is_ok());
    }

    #[test]
    fn arrow_points_are_open_path() {
        let pts = arrow_points(50.0, 100.0, 40.0);
        assert_eq!(pts.len(), 7);
        assert_ne!(pts.first(), pts.last());
        assert_eq!(pts[0], Point::new(50, 60));
    }

    #[test]
    fn overlay_only_touches_bottom_band() {
        let mut canvas = RgbaImage::from_pixel(640, 360, Rgba([0, 0, 0, 255]));
        let text = OverlayText {
            gps_line: format_gps_line(Some((-23.5505, -46.6333)), Some(12.0)),
            timestamp: "2026:10:18 12:30:45".into(),
        };
        draw_overlay(&mut canvas, &text, &OverlayStyle::default()).unwrap();

        let white_in = |y0: u32, y1: u32| {
            (y0..y1).any(|y| (0..640).any(|x| canvas.get_pixel(x, y)[0] > 200))
        };
        assert!(white_in(240, 360), "expected overlay pixels near the bottom");
        assert!(!white_in(0, 200), "top of frame should be untouched");
    }

    #[test]
    fn overlay_timestamp_is_right_aligned() {
        let mut canvas = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 255]));
        let text = OverlayText {
            gps_line: "N".into(),
            timestamp: "2026:10:18 12:30:45".into(),
        };
        draw_overlay(&mut canvas, &text, &OverlayStyle::default()).unwrap();
        // Right quarter of the last text rows carries fill; left quarter does not
        let row_range = 560..588;
        let lit = |xs: std::ops::Range<u32>| {
            row_range
                .clone()
                .any(|y| xs.clone().any(|x| canvas.get_pixel(x, y)[0] > 200))
        };
        assert!(lit(600..788));
        assert!(!lit(0..200));
    }
}
