//! Shared value types for signwatch

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Attribute key holding the sign classification label
pub const CLASS_KEY: &str = "predicted_class";
/// Attribute key holding the captured image file name
pub const IMAGE_KEY: &str = "image_name";
/// Attribute key holding the capture timestamp
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Newtype wrapper for POI ids to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiId(pub String);

impl PoiId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoiId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Planar position under a map projection (Web Mercator metres by default)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A located, classified record checked for proximity (a detected sign)
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub id: PoiId,
    pub location: GeoPoint,
    pub attributes: BTreeMap<String, String>,
}

impl PointOfInterest {
    pub fn new(id: impl Into<String>, location: GeoPoint) -> Self {
        Self { id: PoiId(id.into()), location, attributes: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Classification label, if the record carries one
    pub fn class(&self) -> Option<&str> {
        self.attribute(CLASS_KEY)
    }
}

/// One reading from the location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lon: f64,
    /// Horizontal accuracy radius in metres
    #[serde(default)]
    pub accuracy: f64,
    /// Epoch milliseconds; accepts integers or RFC 3339 strings
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
}

impl PositionSample {
    #[inline]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// What the location source delivers: a fix or a failure report
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(PositionSample),
    Error(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("epoch milliseconds or an RFC 3339 string")
        }

        fn visit_str<E>(self, value: &str) -> Result<u64, E>
        where
            E: de::Error,
        {
            chrono::DateTime::parse_from_rfc3339(value)
                .map(|dt| u64::try_from(dt.timestamp_millis()).unwrap_or(0))
                .map_err(|e| E::custom(format!("invalid timestamp {value:?}: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<u64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<u64, E>
        where
            E: de::Error,
        {
            Ok(u64::try_from(value).unwrap_or(0))
        }

        fn visit_f64<E>(self, value: f64) -> Result<u64, E>
        where
            E: de::Error,
        {
            // Browser geolocation reports DOMHighResTimeStamp as a float
            Ok(if value.is_finite() && value > 0.0 { value as u64 } else { 0 })
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}
