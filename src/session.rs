//! Per-session capture state.
//!
//! A [`Session`] is created once per capture run and passed to the
//! operations that need it. It tracks the location stream (latest fix and
//! best fix so far) and the working copy of the photo being captured.

use crate::types::GeoFix;

#[derive(Debug, Default, Clone)]
pub struct Session {
    current: Option<GeoFix>,
    best: Option<GeoFix>,
    active_photo: Option<Vec<u8>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fix from the location stream. Returns true when it became
    /// the new best fix.
    pub fn update_fix(&mut self, fix: GeoFix) -> bool {
        self.current = Some(fix);
        let improved = self.best.as_ref().is_none_or(|best| fix.improves_on(best));
        if improved {
            self.best = Some(fix);
        }
        improved
    }

    pub fn current_fix(&self) -> Option<&GeoFix> {
        self.current.as_ref()
    }

    pub fn best_fix(&self) -> Option<&GeoFix> {
        self.best.as_ref()
    }

    /// The fix to record with a photo: best, else latest.
    pub fn recorded_fix(&self) -> Option<&GeoFix> {
        self.best.as_ref().or(self.current.as_ref())
    }

    /// Status line for display: `±12m`, or `no fix` before the first sample.
    pub fn gps_status(&self) -> String {
        self.best
            .as_ref()
            .map(GeoFix::accuracy_label)
            .unwrap_or_else(|| "no fix".to_string())
    }

    pub fn set_active_photo(&mut self, bytes: Vec<u8>) {
        self.active_photo = Some(bytes);
    }

    pub fn active_photo(&self) -> Option<&[u8]> {
        self.active_photo.as_deref()
    }

    /// Drop the working copy after it has been saved or discarded.
    pub fn clear_active_photo(&mut self) -> Option<Vec<u8>> {
        self.active_photo.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(acc: f64, ms: i64) -> GeoFix {
        GeoFix::new(-23.55, -46.63, acc, ms)
    }

    #[test]
    fn best_fix_has_lowest_accuracy() {
        let mut session = Session::new();
        for (acc, ms) in [(30.0, 1), (8.0, 2), (15.0, 3), (9.0, 4)] {
            session.update_fix(fix(acc, ms));
        }
        assert_eq!(session.best_fix().unwrap().accuracy_meters, 8.0);
        assert_eq!(session.current_fix().unwrap().sampled_at_epoch_ms, 4);
    }

    #[test]
    fn tie_keeps_earliest() {
        let mut session = Session::new();
        assert!(session.update_fix(fix(5.0, 1)));
        assert!(!session.update_fix(fix(5.0, 2)));
        assert_eq!(session.best_fix().unwrap().sampled_at_epoch_ms, 1);
    }

    #[test]
    fn best_is_never_worse_than_any_sample() {
        let accs = [12.0, 40.0, 3.5, 3.5, 90.0, 7.0];
        let mut session = Session::new();
        for (i, acc) in accs.iter().enumerate() {
            session.update_fix(fix(*acc, i as i64));
        }
        let best = session.best_fix().unwrap();
        assert!(accs.iter().all(|a| best.accuracy_meters <= *a));
        assert_eq!(best.sampled_at_epoch_ms, 2);
    }

    #[test]
    fn recorded_fix_prefers_best() {
        let mut session = Session::new();
        assert!(session.recorded_fix().is_none());
        session.update_fix(fix(4.0, 1));
        session.update_fix(fix(20.0, 2));
        assert_eq!(session.recorded_fix().unwrap().sampled_at_epoch_ms, 1);
    }

    #[test]
    fn gps_status_label() {
        let mut session = Session::new();
        assert_eq!(session.gps_status(), "no fix");
        session.update_fix(fix(11.6, 1));
        assert_eq!(session.gps_status(), "\u{b1}12m");
    }

    #[test]
    fn active_photo_lifecycle() {
        let mut session = Session::new();
        session.set_active_photo(vec![1, 2]);
        assert_eq!(session.active_photo(), Some(&[1u8, 2][..]));
        assert_eq!(session.clear_active_photo(), Some(vec![1, 2]));
        assert!(session.active_photo().is_none());
    }
}
