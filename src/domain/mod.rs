//! Domain models - value types and geometry
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - GeoPoint, ProjectedPoint, PointOfInterest, PositionSample
//! - `alert` - ProximityAlert egress record
//! - `geo` - haversine distance and circle approximation
//! - `projection` - geographic <-> projected conversion capability

pub mod alert;
pub mod geo;
pub mod projection;
pub mod types;

// Re-export commonly used types at module level
pub use alert::ProximityAlert;
pub use geo::{circular_polygon, haversine_distance_meters, CircularRegion, GeometryError};
pub use projection::{Projection, WebMercator};
pub use types::{GeoPoint, LocationEvent, PoiId, PointOfInterest, PositionSample, ProjectedPoint};
