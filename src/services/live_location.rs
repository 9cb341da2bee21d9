//! Live position display state
//!
//! Turns each fix from the location source into what the map layer draws:
//! the projected position marker, the accuracy ring, and a one-time
//! recenter on the first fix.

use crate::domain::geo::{circular_polygon, GeometryError};
use crate::domain::projection::{Projection, WebMercator};
use crate::domain::types::{PositionSample, ProjectedPoint};
use tracing::{debug, info, warn};

/// Segments used for the accuracy ring
pub const DEFAULT_ACCURACY_SEGMENTS: usize = 64;

/// Drawing instructions produced for one fix
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub position: ProjectedPoint,
    /// Closed ring around `position`; `None` when the reported accuracy is unusable
    pub accuracy_ring: Option<Vec<ProjectedPoint>>,
    /// Set on the first fix only
    pub recenter: Option<ProjectedPoint>,
}

pub struct LiveLocation<P: Projection = WebMercator> {
    projection: P,
    segments: usize,
    has_centered: bool,
    last_position: Option<ProjectedPoint>,
}

impl LiveLocation<WebMercator> {
    pub fn new(segments: usize) -> Result<Self, GeometryError> {
        Self::with_projection(WebMercator, segments)
    }
}

impl<P: Projection> LiveLocation<P> {
    /// Fails if `segments` could never produce a ring
    pub fn with_projection(projection: P, segments: usize) -> Result<Self, GeometryError> {
        // Validate once up front; per-fix failures can then only come from accuracy
        circular_polygon(ProjectedPoint::new(0.0, 0.0), 0.0, segments)?;
        info!(projection = %projection.code(), segments = %segments, "live_location_ready");
        Ok(Self { projection, segments, has_centered: false, last_position: None })
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn last_position(&self) -> Option<ProjectedPoint> {
        self.last_position
    }

    pub fn has_centered(&self) -> bool {
        self.has_centered
    }

    pub fn on_fix(&mut self, sample: &PositionSample) -> LocationUpdate {
        let position = self.projection.to_projected(sample.location());
        self.last_position = Some(position);

        let accuracy_ring = match circular_polygon(position, sample.accuracy, self.segments) {
            Ok(ring) => Some(ring),
            Err(e) => {
                warn!(accuracy = %sample.accuracy, error = %e, "accuracy_ring_skipped");
                None
            }
        };

        let recenter = if self.has_centered {
            None
        } else {
            self.has_centered = true;
            info!(x = %position.x, y = %position.y, "view_centered_on_first_fix");
            Some(position)
        };

        debug!(
            lat = %sample.lat,
            lon = %sample.lon,
            accuracy = %sample.accuracy,
            "live_location_updated"
        );

        LocationUpdate { position, accuracy_ring, recenter }
    }
}
