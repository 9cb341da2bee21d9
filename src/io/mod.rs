//! IO modules - external data interfaces
//!
//! This module contains all external IO operations:
//! - `geojson` - Sign dataset loading and export (GeoJSON FeatureCollection)
//! - `location_source` - Recorded position track replay (JSONL)
//! - `egress` - Alert output to file (JSONL format) or log

pub mod egress;
pub mod geojson;
pub mod location_source;

// Re-export commonly used types
pub use egress::{AlertSink, JsonlAlertSink, LogAlertSink, MemoryAlertSink};
pub use geojson::{load_catalog, parse_signs, write_signs};
pub use location_source::TrackReplay;
