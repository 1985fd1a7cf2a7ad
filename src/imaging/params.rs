//! Parameter types for image operations.
//!
//! These describe *what* to do, not *how*. The [`operations`](super::operations)
//! module decides what to produce and hands these to the
//! [`backend`](super::backend), which does the pixel work.
//!
//! ## Types
//!
//! - [`Quality`] — JPEG encoding quality (1–100, default 92). Clamped on construction.
//! - [`RotateAngle`] — A rotation restricted to multiples of 90° in `-270..=270`.
//! - [`OverlayStyle`] — Font sizing inputs for the burned-in overlay.

use std::fmt;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// Rotation by a multiple of 90 degrees. Positive angles turn clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateAngle(i16);

/// An angle outside `{-270, -180, -90, 0, 90, 180, 270}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAngle(pub i32);

impl fmt::Display for InvalidAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rotation must be a multiple of 90 between -270 and 270, got {}", self.0)
    }
}

impl RotateAngle {
    pub const NONE: RotateAngle = RotateAngle(0);

    pub fn new(degrees: i32) -> Result<Self, InvalidAngle> {
        if degrees % 90 == 0 && (-270..=270).contains(&degrees) {
            Ok(Self(degrees as i16))
        } else {
            Err(InvalidAngle(degrees))
        }
    }

    /// Number of clockwise quarter turns, in `0..4`.
    pub fn quarter_turns(self) -> u8 {
        (self.0 as i32 / 90).rem_euclid(4) as u8
    }
}

/// Font sizing inputs for the overlay: `clamp(min_px, height * scale, max_px)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub font_scale: f64,
    pub min_font_px: u32,
    pub max_font_px: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_scale: 0.04,
            min_font_px: 20,
            max_font_px: 80,
        }
    }
}
