//! Map projection capability
//!
//! Rendering collaborators own projection math; the core only needs a
//! conversion pair. `WebMercator` (EPSG:3857) is the projection the basemap
//! tiles use and is what the CLI draws accuracy rings in.

use crate::domain::types::{GeoPoint, ProjectedPoint};
use std::f64::consts::PI;

/// Spherical Mercator radius (WGS84 semi-major axis)
const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Latitude limit of the square Web Mercator world
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Conversion between geographic and projected coordinates
pub trait Projection {
    fn to_projected(&self, point: GeoPoint) -> ProjectedPoint;
    fn to_geographic(&self, point: ProjectedPoint) -> GeoPoint;

    /// Short code for logs (e.g. "EPSG:3857")
    fn code(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn to_projected(&self, point: GeoPoint) -> ProjectedPoint {
        let lat = point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let x = MERCATOR_RADIUS_M * point.lon.to_radians();
        let y = MERCATOR_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        ProjectedPoint::new(x, y)
    }

    fn to_geographic(&self, point: ProjectedPoint) -> GeoPoint {
        let lon = (point.x / MERCATOR_RADIUS_M).to_degrees();
        let lat = (2.0 * (point.y / MERCATOR_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
        GeoPoint::new(lat, lon)
    }

    fn code(&self) -> &str {
        "EPSG:3857"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_origin() {
        let p = WebMercator.to_projected(GeoPoint::new(0.0, 0.0));
        assert!(p.x.abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian_x() {
        let p = WebMercator.to_projected(GeoPoint::new(0.0, 180.0));
        assert!((p.x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_recovers_position() {
        let point = GeoPoint::new(17.983326, 79.529158);
        let back = WebMercator.to_geographic(WebMercator.to_projected(point));
        assert!((back.lat - point.lat).abs() < 1e-9);
        assert!((back.lon - point.lon).abs() < 1e-9);
    }

    #[test]
    fn test_polar_latitudes_are_clamped() {
        let p = WebMercator.to_projected(GeoPoint::new(90.0, 0.0));
        assert!(p.y.is_finite());
        assert_eq!(WebMercator.code(), "EPSG:3857");
    }
}
