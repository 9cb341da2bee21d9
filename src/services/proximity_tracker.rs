//! Proximity alerting for points of interest
//!
//! Decides which POIs are close enough to the user to notify about, and
//! makes sure each one is notified only once per session. A session ends
//! with an explicit `reset()`.

use crate::domain::alert::new_uuid_v7;
use crate::domain::geo::haversine_distance_meters;
use crate::domain::types::{GeoPoint, PoiId, PointOfInterest};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::{debug, info};

/// Default alert radius in metres
pub const DEFAULT_THRESHOLD_M: f64 = 20.0;

/// A POI that crossed into the alert radius on this update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triggered<'a> {
    pub poi: &'a PointOfInterest,
    pub distance_m: f64,
}

/// Tracks which POIs have been alerted in the current session
pub struct ProximityTracker {
    threshold_m: f64,
    /// Ids already notified (cleared only by reset)
    alerted: FxHashSet<PoiId>,
    /// UUIDv7 identifying the current session, regenerated on reset
    session_id: String,
}

impl ProximityTracker {
    pub fn new(threshold_m: f64) -> Self {
        let session_id = new_uuid_v7();
        info!(threshold_m = %threshold_m, session_id = %session_id, "proximity_tracker_created");
        Self { threshold_m, alerted: FxHashSet::default(), session_id }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Check POIs against the user position and return the newly triggered ones
    ///
    /// Result order follows `pois`. A POI already alerted this session is
    /// skipped without computing its distance.
    pub fn update<'a>(
        &mut self,
        user: GeoPoint,
        pois: &'a [PointOfInterest],
    ) -> Vec<&'a PointOfInterest> {
        self.update_with_distance(user, pois).into_iter().map(|t| t.poi).collect()
    }

    /// Same as `update`, also reporting the distance that triggered each POI
    pub fn update_with_distance<'a>(
        &mut self,
        user: GeoPoint,
        pois: &'a [PointOfInterest],
    ) -> SmallVec<[Triggered<'a>; 4]> {
        let mut triggered = SmallVec::new();

        for poi in pois {
            if self.alerted.contains(&poi.id) {
                continue;
            }

            let distance_m = haversine_distance_meters(user, poi.location);
            if distance_m <= self.threshold_m {
                self.alerted.insert(poi.id.clone());
                debug!(
                    poi_id = %poi.id,
                    distance_m = format!("{:.1}", distance_m),
                    session_id = %self.session_id,
                    "poi_in_range"
                );
                triggered.push(Triggered { poi, distance_m });
            }
        }

        triggered
    }

    /// Clear the alert record so every POI may trigger again
    pub fn reset(&mut self) {
        let cleared = self.alerted.len();
        self.alerted.clear();
        self.session_id = new_uuid_v7();
        info!(cleared = %cleared, session_id = %self.session_id, "proximity_tracker_reset");
    }

    /// Whether `id` has already been alerted this session
    pub fn contains(&self, id: &PoiId) -> bool {
        self.alerted.contains(id)
    }

    /// Number of POIs alerted this session
    pub fn alerted_count(&self) -> usize {
        self.alerted.len()
    }
}

impl Default for ProximityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_M)
    }
}
