//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` (JPEG, PNG, WebP in; JPEG out) |
//! | **EXIF block** | custom TIFF writer/reader, spliced in with `img-parts` |
//! | **Rotate / crop** | `image::DynamicImage::{rotate90, crop_imm}` |
//! | **Overlay** | `imageproc` text + polygon drawing, `ab_glyph` font |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry, overlay layout, DMS math (unit testable)
//! - **Parameters**: Quality, rotation angle, overlay style
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Exif**: The metadata codec
//! - **Overlay**: Drawing the evidence overlay onto a pixel buffer
//! - **Operations**: High-level transforms combining all of the above

pub mod backend;
mod calculations;
pub mod exif;
pub mod operations;
pub mod overlay;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    CropRect, Dms, calculate_aspect_crop, fixed_point, from_dms, rotated_dimensions, to_dms,
};
pub use exif::{CodecError, MetadataBlock};
pub use operations::{
    TransformConfig, TransformError, apply_orientation, burn_overlay, crop_to_aspect_ratio,
    render_export, rotate,
};
pub use params::{InvalidAngle, OverlayStyle, Quality, RotateAngle};
pub use rust_backend::RustBackend;
