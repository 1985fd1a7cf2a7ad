//! CLI output formatting.
//!
//! Every photo is displayed by its identity first (zero-padded id and capture
//! date), with inspection details as indented context lines:
//!
//! ## List
//!
//! ```text
//! 007 18/10/2026 12:30:45
//!     Work front: Frente Norte
//!     Location: -23.550500, -46.633300 (±12m)
//! 006 18/10/2026 12:29:02
//!     Work front: (none)
//!
//! More: gdr-cam list --after 7:1760790542000:6
//! ```
//!
//! ## Show
//!
//! ```text
//! 007 18/10/2026 12:30:45
//!     Work front: Frente Norte
//!     Coronation: 42
//!     Activity: Inspeção de drenagem
//!     Category: Conformidade
//!     Location: -23.550500, -46.633300 (±12m)
//!     Embedded: 2026:10:18 12:30:45, GPS S 23.550500 W 46.633300, comment 212 bytes
//! ```
//!
//! ## Export
//!
//! ```text
//! Exporting 3 photos
//!     001 GDR_2026-10-18T12-30-45_ID7.jpg
//!     002 failed (photo 6): could not decode image
//!     003 GDR_2026-10-18T12-31-10_ID5.jpg
//! Exported 2, failed 1
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::export::{ExportEvent, ExportOutcome};
use crate::imaging::MetadataBlock;
use crate::store::{Page, PhotoRecord};
use crate::types::{GeoFix, InspectionMetadata};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format an id as 3-digit zero-padded.
fn format_index(pos: i64) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("(none)")
}

fn location_line(fix: Option<&GeoFix>) -> String {
    match fix {
        Some(f) => format!(
            "{}Location: {:.6}, {:.6} ({})",
            indent(1),
            f.latitude,
            f.longitude,
            f.accuracy_label()
        ),
        None => format!("{}Location: (none)", indent(1)),
    }
}

fn record_header(record: &PhotoRecord) -> String {
    format!("{} {}", format_index(record.id), record.display_date)
}

fn detail_lines(meta: &InspectionMetadata) -> Vec<String> {
    vec![
        format!("{}Work front: {}", indent(1), or_none(meta.work_front.as_deref())),
        format!("{}Coronation: {}", indent(1), or_none(meta.coronation_value.as_deref())),
        format!("{}Activity: {}", indent(1), or_none(meta.activity_performed.as_deref())),
        format!("{}Category: {}", indent(1), or_none(meta.observation_category.as_deref())),
        location_line(meta.location.as_ref()),
    ]
}

// ============================================================================
// List
// ============================================================================

pub fn format_list_output(page: &Page) -> Vec<String> {
    if page.records.is_empty() {
        return vec!["No photos".to_string()];
    }
    let mut lines = Vec::new();
    for record in &page.records {
        lines.push(record_header(record));
        lines.push(format!(
            "{}Work front: {}",
            indent(1),
            or_none(record.metadata.work_front.as_deref())
        ));
        if record.metadata.location.is_some() {
            lines.push(location_line(record.metadata.location.as_ref()));
        }
    }
    lines.push(String::new());
    lines.push(match page.next.filter(|_| page.has_more) {
        Some(cursor) => format!("More: gdr-cam list --after {}", cursor),
        None => "End of gallery".to_string(),
    });
    lines
}

pub fn print_list_output(page: &Page) {
    for line in format_list_output(page) {
        println!("{}", line);
    }
}

// ============================================================================
// Show
// ============================================================================

fn embedded_summary(block: &MetadataBlock) -> String {
    if block.is_empty() {
        return format!("{}Embedded: (no metadata)", indent(1));
    }
    let mut parts = Vec::new();
    if let Some(stamp) = &block.photo.date_time_original {
        parts.push(stamp.clone());
    }
    if let Some(gps) = &block.gps {
        parts.push(format!(
            "GPS {} {:.6} {} {:.6}",
            gps.latitude.reference_char(),
            gps.latitude_degrees().map_or(0.0, f64::abs),
            gps.longitude.reference_char(),
            gps.longitude_degrees().map_or(0.0, f64::abs),
        ));
    }
    if let Some(comment) = &block.photo.user_comment {
        parts.push(format!("comment {} bytes", comment.len()));
    }
    format!("{}Embedded: {}", indent(1), parts.join(", "))
}

pub fn format_show_output(record: &PhotoRecord, block: &MetadataBlock) -> Vec<String> {
    let mut lines = vec![record_header(record)];
    lines.extend(detail_lines(&record.metadata));
    lines.push(embedded_summary(block));
    lines
}

pub fn print_show_output(record: &PhotoRecord, block: &MetadataBlock) {
    for line in format_show_output(record, block) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

/// Format a single export progress event.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::Started { total } => vec![format!("Exporting {} photos", total)],
        ExportEvent::ItemExported {
            index, file_name, ..
        } => vec![format!(
            "{}{} {}",
            indent(1),
            format_index(*index as i64 + 1),
            file_name
        )],
        ExportEvent::ItemFailed { index, id, reason } => vec![format!(
            "{}{} failed (photo {}): {}",
            indent(1),
            format_index(*index as i64 + 1),
            id,
            reason
        )],
        ExportEvent::Finished { succeeded, failed } => {
            vec![format!("Exported {}, failed {}", succeeded, failed)]
        }
    }
}

pub fn format_export_result(outcome: &ExportOutcome, path: &Path) -> Vec<String> {
    let (succeeded, failed) = outcome.counts();
    match outcome {
        ExportOutcome::Single { .. } => vec![format!("Saved {}", path.display())],
        ExportOutcome::Archive { .. } => vec![format!(
            "Saved {} ({} photos, {} failed)",
            path.display(),
            succeeded,
            failed
        )],
    }
}

pub fn print_export_result(outcome: &ExportOutcome, path: &Path) {
    for line in format_export_result(outcome, path) {
        println!("{}", line);
    }
}

// ============================================================================
// Capture / delete
// ============================================================================

pub fn format_saved(id: i64, gps_status: &str) -> Vec<String> {
    vec![format!("Saved photo {} (GPS {})", format_index(id), gps_status)]
}

pub fn format_deleted(requested: usize, removed: usize) -> Vec<String> {
    if requested == removed {
        vec![format!("Deleted {} photos", removed)]
    } else {
        vec![format!(
            "Deleted {} photos ({} not found)",
            removed,
            requested - removed
        )]
    }
}
