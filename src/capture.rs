//! Capture flow: raw camera bytes in, saved photo record out.
//!
//! ```text
//! raw bytes ─▶ prepare (orientation, 16:9 / 9:16 crop) ─▶ Session working copy
//!                                                            │
//!     form submit ─▶ encode metadata ─▶ embed ─▶ auto-rotate ─▶ PhotoStore
//! ```
//!
//! A photo can be saved with the inspection form (required fields are
//! checked first) or without it, in which case only location and timestamp
//! are recorded. The last submitted form is persisted so the next capture
//! starts prefilled.

use crate::imaging::exif::{self, CodecError};
use crate::imaging::{
    ImageBackend, TransformConfig, TransformError, apply_orientation, burn_overlay,
    crop_to_aspect_ratio, rotate,
};
use crate::naming::download_file_name;
use crate::session::Session;
use crate::store::{DISPLAY_DATE_FORMAT, PhotoStore, StoreError};
use crate::types::{FormInput, InspectionMetadata};
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no photo has been captured")]
    NoActivePhoto,
    #[error("required field '{0}' is missing")]
    MissingField(String),
    #[error("image error: {0}")]
    Transform(#[from] TransformError),
    #[error("metadata error: {0}")]
    Codec(#[from] CodecError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub transform: TransformConfig,
    /// Rotation applied after the metadata block is embedded.
    pub auto_rotate: i32,
    /// Form fields that must be filled for a with-form save.
    pub require_form: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            transform: TransformConfig::default(),
            auto_rotate: -90,
            require_form: vec![
                "work_front".to_string(),
                "coronation".to_string(),
                "observation_category".to_string(),
            ],
        }
    }
}

/// Straighten and crop a raw capture, then make it the session's working
/// copy.
pub fn prepare(
    backend: &impl ImageBackend,
    session: &mut Session,
    raw: &[u8],
    config: &CaptureConfig,
) -> Result<()> {
    let upright = apply_orientation(backend, raw, &config.transform)?;
    let cropped = crop_to_aspect_ratio(backend, &upright, &config.transform)?;
    debug!(bytes = cropped.len(), "capture prepared");
    session.set_active_photo(cropped);
    Ok(())
}

/// Check that every required field has a non-blank value.
pub fn validate_form(form: &FormInput, required: &[String]) -> Result<()> {
    match required.iter().find(|name| form.field(name).is_none()) {
        Some(name) => Err(CaptureError::MissingField(name.clone())),
        None => Ok(()),
    }
}

/// Metadata for a with-form save.
pub fn form_metadata(form: &FormInput, session: &Session, now: DateTime<Local>) -> InspectionMetadata {
    InspectionMetadata {
        work_front: form.field("work_front").map(str::to_string),
        coronation_value: form.field("coronation").map(str::to_string),
        activity_performed: form.field("activity").map(str::to_string),
        observation_category: form.field("observation_category").map(str::to_string),
        location: session.recorded_fix().copied(),
        recorded_at: now.format(DISPLAY_DATE_FORMAT).to_string(),
    }
}

/// Metadata for a save without the form: location and timestamp only.
pub fn bare_metadata(session: &Session, now: DateTime<Local>) -> InspectionMetadata {
    InspectionMetadata {
        location: session.recorded_fix().copied(),
        recorded_at: now.format(DISPLAY_DATE_FORMAT).to_string(),
        ..Default::default()
    }
}

/// Save the working copy with the inspection form.
pub async fn save_with_form(
    store: &PhotoStore,
    backend: &impl ImageBackend,
    session: &mut Session,
    form: &FormInput,
    config: &CaptureConfig,
) -> Result<i64> {
    validate_form(form, &config.require_form)?;
    let now = Local::now();
    let metadata = form_metadata(form, session, now);
    let id = persist(store, backend, session, metadata, now, config).await?;
    store.save_form_defaults(form).await?;
    Ok(id)
}

/// Save the working copy without the form.
pub async fn save_without_form(
    store: &PhotoStore,
    backend: &impl ImageBackend,
    session: &mut Session,
    config: &CaptureConfig,
) -> Result<i64> {
    let now = Local::now();
    let metadata = bare_metadata(session, now);
    persist(store, backend, session, metadata, now, config).await
}

async fn persist(
    store: &PhotoStore,
    backend: &impl ImageBackend,
    session: &mut Session,
    metadata: InspectionMetadata,
    now: DateTime<Local>,
    config: &CaptureConfig,
) -> Result<i64> {
    let photo = session.active_photo().ok_or(CaptureError::NoActivePhoto)?;
    let block = exif::encode(&metadata, now.naive_local())?;
    let tagged = exif::embed(photo, &block)?;
    let rotated = rotate(backend, &tagged, config.auto_rotate, &config.transform)?;
    let id = store.insert_at(rotated, metadata, now).await?;
    session.clear_active_photo();
    info!(id, "photo saved");
    Ok(id)
}

/// Last submitted form values, or an empty form.
pub async fn prefill_form(store: &PhotoStore) -> Result<FormInput> {
    Ok(store.load_form_defaults().await?.unwrap_or_default())
}

/// Render the working copy with its overlay for a direct download.
///
/// The working copy has no metadata yet, so the overlay uses the session's
/// fix and the current time.
pub fn download_working_copy(
    backend: &impl ImageBackend,
    session: &Session,
    config: &CaptureConfig,
) -> Result<(String, Vec<u8>)> {
    let photo = session.active_photo().ok_or(CaptureError::NoActivePhoto)?;
    let now = Local::now();
    let stamp = now.format(DISPLAY_DATE_FORMAT).to_string();
    let bytes = burn_overlay(
        backend,
        photo,
        session.recorded_fix(),
        &stamp,
        &config.transform,
    )?;
    Ok((download_file_name(now.timestamp_millis()), bytes))
}
