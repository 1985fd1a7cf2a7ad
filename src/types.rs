//! Shared domain types: location fixes and the inspection record attached to
//! every saved photo.
//!
//! Both types serialize with camelCase keys. [`InspectionMetadata`] is the
//! exact JSON that ends up in the EXIF `UserComment` field, so renaming a
//! field here changes what field tools see when they inspect a photo.

use serde::{Deserialize, Serialize};

/// A single position sample from the location subsystem.
///
/// Immutable once recorded. Optional fields mirror what a device may or may
/// not report (altitude on indoor fixes, heading while stationary, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    pub sampled_at_epoch_ms: i64,
}

impl GeoFix {
    /// A fix with only the mandatory fields set.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, sampled_at_epoch_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            altitude_meters: None,
            altitude_accuracy: None,
            heading_degrees: None,
            speed_mps: None,
            sampled_at_epoch_ms,
        }
    }

    /// Strictly better accuracy. Equal accuracy is not an improvement, so the
    /// earlier of two equally good fixes is kept.
    pub fn improves_on(&self, other: &GeoFix) -> bool {
        self.accuracy_meters < other.accuracy_meters
    }

    /// Short status label such as `±12m`, used by the GPS status display.
    pub fn accuracy_label(&self) -> String {
        format!("\u{b1}{}m", self.accuracy_meters.round() as i64)
    }
}

/// Structured inspection data recorded with each photo.
///
/// `work_front` is only absent for photos saved without the form, which
/// carry nothing but location and timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_front: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coronation_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_performed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoFix>,
    pub recorded_at: String,
}

impl InspectionMetadata {
    /// True when any of the free-form inspection fields carries a value.
    ///
    /// Controls whether the JSON comment is written into the metadata block.
    pub fn has_form_fields(&self) -> bool {
        [
            &self.work_front,
            &self.coronation_value,
            &self.activity_performed,
            &self.observation_category,
        ]
        .iter()
        .any(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Values a field worker types into the capture form.
///
/// Persisted between captures so the next form starts prefilled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    #[serde(default)]
    pub work_front: Option<String>,
    #[serde(default)]
    pub coronation: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub observation_category: Option<String>,
}

impl FormInput {
    /// Look up a field by its config name (`work_front`, `coronation`, ...).
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "work_front" => &self.work_front,
            "coronation" => &self.coronation,
            "activity" => &self.activity,
            "observation_category" => &self.observation_category,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Names accepted by [`field`](Self::field).
    pub const FIELD_NAMES: &'static [&'static str] =
        &["work_front", "coronation", "activity", "observation_category"];
}
