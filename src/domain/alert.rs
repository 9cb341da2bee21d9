//! Proximity alert record handed to notification sinks

use crate::domain::types::{PointOfInterest, PositionSample, CLASS_KEY, IMAGE_KEY};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// A POI that entered the alert radius, as written to egress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityAlert {
    /// Tracking session the alert belongs to
    pub session: String,
    pub poi_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub distance_m: f64,
    pub poi_lat: f64,
    pub poi_lon: f64,
    pub user_lat: f64,
    pub user_lon: f64,
    /// Timestamp of the position sample that triggered the alert (epoch ms)
    pub sample_ts: u64,
    /// Emission time (epoch ms)
    pub ts: u64,
}

impl ProximityAlert {
    pub fn new(
        session: &str,
        poi: &PointOfInterest,
        sample: &PositionSample,
        distance_m: f64,
    ) -> Self {
        Self {
            session: session.to_string(),
            poi_id: poi.id.to_string(),
            class: poi.attribute(CLASS_KEY).map(str::to_string),
            image: poi.attribute(IMAGE_KEY).map(str::to_string),
            distance_m,
            poi_lat: poi.location.lat,
            poi_lon: poi.location.lon,
            user_lat: sample.lat,
            user_lon: sample.lon,
            sample_ts: sample.timestamp,
            ts: epoch_ms(),
        }
    }

    /// Human-readable line for toast-style display
    pub fn message(&self) -> String {
        format!(
            "{} ahead ({:.0} m)",
            self.class.as_deref().unwrap_or("Sign"),
            self.distance_m
        )
    }

    pub fn to_json(&self) -> String {
        // Serialize derives only plain fields; this cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
