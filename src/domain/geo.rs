//! Geodesic distance and circle approximation
//!
//! Distances are always true haversine great-circle distances. The circle
//! polygon is for drawing accuracy/alert radii only.

use crate::domain::types::{GeoPoint, ProjectedPoint};
use std::f64::consts::PI;
use thiserror::Error;

/// Mean Earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Minimum number of segments for a circle approximation
pub const MIN_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Great-circle distance using the haversine formula.
/// Input lat/lon in degrees. Output in meters.
pub fn haversine_distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h slightly above 1 for antipodal points; NaN passes through
    let h = if h > 1.0 { 1.0 } else { h };
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Circle of a given radius around a projected center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularRegion {
    center: ProjectedPoint,
    radius_m: f64,
    segments: usize,
}

impl CircularRegion {
    pub fn new(
        center: ProjectedPoint,
        radius_m: f64,
        segments: usize,
    ) -> Result<Self, GeometryError> {
        if segments < MIN_SEGMENTS {
            return Err(GeometryError::InvalidArgument(format!(
                "segments must be >= {MIN_SEGMENTS}, got {segments}"
            )));
        }
        if radius_m.is_nan() || radius_m < 0.0 {
            return Err(GeometryError::InvalidArgument(format!(
                "radius must be >= 0, got {radius_m}"
            )));
        }
        Ok(Self { center, radius_m, segments })
    }

    pub fn center(&self) -> ProjectedPoint {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Closed ring of `segments + 1` points starting at angle 0
    pub fn ring(&self) -> Vec<ProjectedPoint> {
        let step = 2.0 * PI / self.segments as f64;
        let mut ring = Vec::with_capacity(self.segments + 1);
        for i in 0..self.segments {
            let angle = step * i as f64;
            ring.push(ProjectedPoint::new(
                self.center.x + self.radius_m * angle.cos(),
                self.center.y + self.radius_m * angle.sin(),
            ));
        }
        ring.push(ring[0]);
        ring
    }
}

/// Polygon approximating a circle in projected space
pub fn circular_polygon(
    center: ProjectedPoint,
    radius_m: f64,
    segments: usize,
) -> Result<Vec<ProjectedPoint>, GeometryError> {
    Ok(CircularRegion::new(center, radius_m, segments)?.ring())
}
