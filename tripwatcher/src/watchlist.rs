//! Admission set ensuring one worker per trip.

use std::collections::HashSet;
use std::sync::Mutex;

/// The set of trip ids currently owned by a worker.
///
/// Admission is a single check-and-insert under the lock, so two scans can
/// never hand the same trip to two workers. The lock is never held across
/// an await point.
#[derive(Default)]
pub struct WatchList {
    watching: Mutex<HashSet<String>>,
}

impl WatchList {
    pub fn new() -> Self {
        WatchList::default()
    }

    pub fn contains(&self, trip_id: &str) -> bool {
        self.watching
            .lock()
            .expect("watch list lock poisoned")
            .contains(trip_id)
    }

    /// Claim a trip. Returns false when a worker already owns it.
    pub fn insert(&self, trip_id: &str) -> bool {
        self.watching
            .lock()
            .expect("watch list lock poisoned")
            .insert(trip_id.to_string())
    }

    /// Release a trip so a later scan can pick it up again.
    pub fn remove(&self, trip_id: &str) {
        self.watching
            .lock()
            .expect("watch list lock poisoned")
            .remove(trip_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_claims_exactly_once() {
        let list = WatchList::new();
        assert!(!list.contains("trip-1"));
        assert!(list.insert("trip-1"));
        assert!(!list.insert("trip-1"));
        assert!(list.contains("trip-1"));
    }

    #[test]
    fn remove_releases_the_slot() {
        let list = WatchList::new();
        assert!(list.insert("trip-1"));
        list.remove("trip-1");
        assert!(!list.contains("trip-1"));
        assert!(list.insert("trip-1"));
    }

    #[test]
    fn trips_are_independent() {
        let list = WatchList::new();
        assert!(list.insert("trip-1"));
        assert!(list.insert("trip-2"));
        list.remove("trip-1");
        assert!(list.contains("trip-2"));
    }
}
