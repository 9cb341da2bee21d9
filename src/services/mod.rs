//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `viewer` - Session event loop tying location, proximity and alerts together
//! - `proximity_tracker` - One-shot proximity alerting per session
//! - `live_location` - Position marker, accuracy ring and first-fix centering
//! - `catalog` - Sign collection, filtering and class edits

pub mod catalog;
pub mod live_location;
pub mod proximity_tracker;
pub mod viewer;

// Re-export commonly used types
pub use catalog::{image_path, ImageMode, SignCatalog, SignFilter};
pub use live_location::{LiveLocation, LocationUpdate};
pub use proximity_tracker::ProximityTracker;
pub use viewer::{SampleOutcome, Viewer};
