//! # GDR-CAM
//!
//! Field inspection photos for construction sites. A worker captures a
//! photo, fills in a short inspection form, and the photo is saved with the
//! form and the GPS fix embedded as EXIF metadata. Saved photos can later be
//! exported with a burned-in evidence overlay, one at a time or as a zip.
//!
//! # Architecture
//!
//! ```text
//! capture ─▶ imaging (orient, crop) ─▶ exif::encode ─▶ embed + rotate ─▶ store
//!                                                                         │
//! export ◀── zip ◀── worker (render_export, one job at a time) ◀──────────┘
//! ```
//!
//! Every image operation takes encoded bytes and returns encoded bytes, and
//! every one of them carries the metadata block across the pixel rewrite.
//! That is what lets an exported photo still show its original GPS and
//! inspection record in any EXIF viewer.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | EXIF codec, rotate / crop / orientation, overlay burn-in |
//! | [`store`] | SQLite photo store with snapshot pagination and change notifications |
//! | [`worker`] | Dedicated transform thread with per-job timeout and id correlation |
//! | [`export`] | Sequential batch export into a store-only zip, partial-failure counts |
//! | [`capture`] | Capture flow: prepare, validate form, tag, rotate, save |
//! | [`session`] | Per-run location state (current / best fix) and working copy |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`types`] | `GeoFix`, `InspectionMetadata`, `FormInput` |
//! | [`naming`] | Export, archive and download file names |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Store-Only Archives
//!
//! Batch archives use the zip `Stored` method. The payload is JPEG, which
//! deflate barely shrinks, and skipping compression keeps exports fast on
//! low-end field devices.
//!
//! ## One Export Job at a Time
//!
//! Batch items are rendered strictly in sequence through a single worker
//! thread. Peak memory is one decoded image regardless of batch size.
//!
//! ## Snapshot Pagination
//!
//! Ids only grow, so the gallery pins the highest id seen on its first page
//! and pages below it. Each page resumes after the `(timestamp, id)` of the
//! last record shown rather than at a row offset, so deleting a listed photo
//! never hides the next one. Photos saved while a user scrolls show up
//! afterwards as their own page.

pub mod capture;
pub mod config;
pub mod export;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod session;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
