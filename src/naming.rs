//! Filenames for exported photos and archives.
//!
//! All names are derived from epoch-millisecond timestamps in UTC so that
//! the same record always exports under the same name:
//!
//! - `GDR_2026-10-18T12-30-45_ID7.jpg`: one photo out of a batch or a
//!   single-photo export (`{prefix}_{iso timestamp}_ID{id}.jpg`)
//! - `GDR_CAM_Pack_1760790645000.zip`: a batch archive
//! - `GDR-CAM-1760790645000.jpg`: download of the working copy at capture
//!
//! The ISO timestamp has milliseconds cut off and `:`/`.` replaced by `-`
//! so the name is valid on every filesystem.

use chrono::{DateTime, SecondsFormat};

/// `YYYY-MM-DDTHH-MM-SS` for an epoch-millisecond instant, UTC.
///
/// Instants outside chrono's range fall back to the Unix epoch.
pub fn iso_stamp(epoch_ms: i64) -> String {
    let instant = DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default();
    let iso = instant.to_rfc3339_opts(SecondsFormat::Millis, true);
    iso.replace([':', '.'], "-").chars().take(19).collect()
}

/// Name of one exported photo.
///
/// ```
/// use gdr_cam::naming::export_file_name;
/// assert_eq!(
///     export_file_name("GDR", 1_760_790_645_123, 7),
///     "GDR_2025-10-18T12-30-45_ID7.jpg"
/// );
/// ```
pub fn export_file_name(prefix: &str, captured_at_ms: i64, id: i64) -> String {
    format!("{}_{}_ID{}.jpg", prefix, iso_stamp(captured_at_ms), id)
}

/// Name of a batch archive created at `now_ms`.
pub fn archive_file_name(archive_prefix: &str, now_ms: i64) -> String {
    format!("{}_{}.zip", archive_prefix, now_ms)
}

/// Name of a working-copy download created at `now_ms`.
pub fn download_file_name(now_ms: i64) -> String {
    format!("GDR-CAM-{}.jpg", now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_stamp_drops_millis_and_separators() {
        assert_eq!(iso_stamp(1_760_790_645_999), "2025-10-18T12-30-45");
    }

    #[test]
    fn iso_stamp_epoch() {
        assert_eq!(iso_stamp(0), "1970-01-01T00-00-00");
    }

    #[test]
    fn iso_stamp_out_of_range_falls_back() {
        assert_eq!(iso_stamp(i64::MAX), "1970-01-01T00-00-00");
    }

    #[test]
    fn export_name_is_deterministic() {
        let a = export_file_name("GDR", 1_760_790_645_000, 42);
        let b = export_file_name("GDR", 1_760_790_645_000, 42);
        assert_eq!(a, b);
        assert_eq!(a, "GDR_2025-10-18T12-30-45_ID42.jpg");
    }

    #[test]
    fn archive_and_download_names() {
        assert_eq!(
            archive_file_name("GDR_CAM_Pack", 1_760_790_645_000),
            "GDR_CAM_Pack_1760790645000.zip"
        );
        assert_eq!(download_file_name(5), "GDR-CAM-5.jpg");
    }
}
