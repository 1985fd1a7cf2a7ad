//! Application configuration.
//!
//! Handles loading, validating, and merging the `config.toml` that lives in
//! the data directory next to the photo database. Stock defaults are the base
//! layer; the user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [store]
//! path = "gdr-cam.sqlite3"  # Relative to the data directory
//! page_size = 24            # Gallery page size
//!
//! [capture]
//! jpeg_quality = 95         # Quality for orientation fix and crop
//! auto_rotate = -90         # Rotation applied after embedding metadata
//! require_form = ["work_front", "coronation", "observation_category"]
//!
//! [export]
//! prefix = "GDR"
//! archive_prefix = "GDR_CAM_Pack"
//! jpeg_quality = 92
//!
//! [worker]
//! timeout_secs = 15         # Per-photo deadline in batch exports
//!
//! [overlay]
//! font_scale = 0.04         # Font size as a fraction of image height
//! min_font_px = 20
//! max_font_px = 80
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::capture::CaptureConfig;
use crate::export::ExportConfig;
use crate::imaging::{OverlayStyle, Quality, RotateAngle, TransformConfig};
use crate::types::FormInput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub capture: CaptureSettings,
    pub export: ExportSettings,
    pub worker: WorkerConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: String,
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "gdr-cam.sqlite3".to_string(),
            page_size: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    pub jpeg_quality: u32,
    pub auto_rotate: i32,
    pub require_form: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            auto_rotate: -90,
            require_form: CaptureConfig::default().require_form,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    pub prefix: String,
    pub archive_prefix: String,
    pub jpeg_quality: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            prefix: "GDR".to_string(),
            archive_prefix: "GDR_CAM_Pack".to_string(),
            jpeg_quality: 92,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    pub timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub font_scale: f64,
    pub min_font_px: u32,
    pub max_font_px: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            font_scale: style.font_scale,
            min_font_px: style.min_font_px,
            max_font_px: style.max_font_px,
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, q) in [
            ("capture.jpeg_quality", self.capture.jpeg_quality),
            ("export.jpeg_quality", self.export.jpeg_quality),
        ] {
            if !(1..=100).contains(&q) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if RotateAngle::new(self.capture.auto_rotate).is_err() {
            return Err(ConfigError::Validation(
                "capture.auto_rotate must be a multiple of 90 between -270 and 270".into(),
            ));
        }
        if let Some(unknown) = self
            .capture
            .require_form
            .iter()
            .find(|f| !FormInput::FIELD_NAMES.contains(&f.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "capture.require_form: unknown field '{unknown}'"
            )));
        }
        if self.store.page_size == 0 {
            return Err(ConfigError::Validation(
                "store.page_size must be non-zero".into(),
            ));
        }
        if self.worker.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "worker.timeout_secs must be non-zero".into(),
            ));
        }
        if !(self.overlay.font_scale > 0.0 && self.overlay.font_scale.is_finite()) {
            return Err(ConfigError::Validation(
                "overlay.font_scale must be positive".into(),
            ));
        }
        if self.overlay.min_font_px == 0 || self.overlay.min_font_px > self.overlay.max_font_px {
            return Err(ConfigError::Validation(
                "overlay.min_font_px must be non-zero and not above max_font_px".into(),
            ));
        }
        if self.export.prefix.is_empty() || self.export.archive_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "export prefixes must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Database location, resolved against the data directory.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.store.path)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.timeout_secs)
    }

    fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            font_scale: self.overlay.font_scale,
            min_font_px: self.overlay.min_font_px,
            max_font_px: self.overlay.max_font_px,
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            transform: TransformConfig {
                quality: Quality::new(self.capture.jpeg_quality),
                overlay: self.overlay_style(),
                ..TransformConfig::default()
            },
            auto_rotate: self.capture.auto_rotate,
            require_form: self.capture.require_form.clone(),
        }
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            prefix: self.export.prefix.clone(),
            archive_prefix: self.export.archive_prefix.clone(),
            transform: TransformConfig {
                quality: Quality::new(self.export.jpeg_quality),
                overlay: self.overlay_style(),
                ..TransformConfig::default()
            },
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `config.toml` from the data directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(data_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = data_dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config for a data directory: stock defaults plus the user file.
pub fn load_config(data_dir: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(data_dir)?)
}

/// Fully commented stock `config.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# GDR-CAM Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the data directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Photo store
# ---------------------------------------------------------------------------
[store]
# SQLite database file, relative to the data directory.
path = "gdr-cam.sqlite3"

# Number of photos per gallery page.
page_size = 24

# ---------------------------------------------------------------------------
# Capture
# ---------------------------------------------------------------------------
[capture]
# JPEG quality (1-100) for the orientation fix and aspect crop.
jpeg_quality = 95

# Rotation in degrees applied after the metadata block is embedded.
# Multiples of 90 between -270 and 270; positive is clockwise.
auto_rotate = -90

# Form fields that must be filled to save with the form.
# Any of: work_front, coronation, activity, observation_category
require_form = ["work_front", "coronation", "observation_category"]

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Exported photos are named {prefix}_{timestamp}_ID{id}.jpg
prefix = "GDR"

# Batch archives are named {archive_prefix}_{epoch ms}.zip
archive_prefix = "GDR_CAM_Pack"

# JPEG quality (1-100) for exported photos.
jpeg_quality = 92

# ---------------------------------------------------------------------------
# Worker
# ---------------------------------------------------------------------------
[worker]
# Seconds a single photo may take in a batch export before it is
# counted as failed.
timeout_secs = 15

# ---------------------------------------------------------------------------
# Overlay
# ---------------------------------------------------------------------------
[overlay]
# Text size as a fraction of image height, clamped to the pixel bounds.
font_scale = 0.04
min_font_px = 20
max_font_px = 80
"##
}
