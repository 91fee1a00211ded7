use std::sync::{Mutex, MutexGuard};

use super::types::GeoFix;

#[derive(Debug, Default)]
struct Slots {
    previous: Option<GeoFix>,
    current: Option<GeoFix>,
}

/// Holds the two most recent fixes.
///
/// The first fix fills both slots, every later fix rotates `current` into
/// `previous`. Callers are expected to feed fixes in timestamp order; the
/// sampling engine discards older fixes before they reach the store.
#[derive(Debug, Default)]
pub struct PositionStore {
    slots: Mutex<Slots>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records `fix` and returns the resulting `(previous, current)` pair.
    pub fn record(&self, fix: GeoFix) -> (GeoFix, GeoFix) {
        let mut slots = self.lock();
        let previous = slots.current.unwrap_or(fix);
        slots.previous = Some(previous);
        slots.current = Some(fix);
        (previous, fix)
    }

    pub fn reset(&self) {
        let mut slots = self.lock();
        slots.previous = None;
        slots.current = None;
    }

    pub fn current(&self) -> Option<GeoFix> {
        self.lock().current
    }

    #[allow(dead_code)]
    pub fn snapshot(&self) -> Option<(GeoFix, GeoFix)> {
        let slots = self.lock();
        slots.previous.zip(slots.current)
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.lock().current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn fix(seconds: i64, lat: f64) -> GeoFix {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        GeoFix::new(lat, 13.4, t0 + Duration::seconds(seconds))
    }

    #[test]
    fn first_record_fills_both_slots() {
        let store = PositionStore::new();
        let f = fix(0, 52.5);
        assert_eq!(store.record(f), (f, f));
        assert_eq!(store.snapshot(), Some((f, f)));
    }

    #[test]
    fn later_records_rotate() {
        let store = PositionStore::new();
        let fixes: Vec<_> = (0..5).map(|i| fix(i * 10, 52.0 + i as f64 * 0.001)).collect();

        let mut last = None;
        for f in &fixes {
            last = Some(store.record(*f));
        }

        assert_eq!(last, Some((fixes[3], fixes[4])));
        assert_eq!(store.current(), Some(fixes[4]));
    }

    #[test]
    fn reset_makes_next_record_a_first_fix() {
        let store = PositionStore::new();
        store.record(fix(0, 52.0));
        store.record(fix(10, 52.1));

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.snapshot(), None);

        let f = fix(20, 48.0);
        assert_eq!(store.record(f), (f, f));
    }

    #[test]
    fn concurrent_records_form_a_single_chain() {
        let store = Arc::new(PositionStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|i| store.record(fix(t * 1000 + i, 50.0 + t as f64)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let pairs: Vec<(GeoFix, GeoFix)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(pairs.len(), 1000);

        // Exactly one record saw an empty store.
        let firsts = pairs.iter().filter(|(p, c)| p == c).count();
        assert_eq!(firsts, 1);

        // Every other record rotated a fix that some record had stored, and
        // no stored fix was rotated out twice.
        let stored: HashSet<_> = pairs.iter().map(|(_, c)| c.timestamp).collect();
        let mut rotated = HashSet::new();
        for (previous, current) in pairs.iter().filter(|(p, c)| p != c) {
            assert!(stored.contains(&previous.timestamp));
            assert!(rotated.insert(previous.timestamp), "{:?} rotated twice", current);
        }

        // The last fix stored is the only one never rotated out.
        let (_, last) = store.snapshot().unwrap();
        assert!(!rotated.contains(&last.timestamp));
        assert_eq!(rotated.len(), 999);
    }
}
