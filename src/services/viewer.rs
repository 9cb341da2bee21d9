//! Viewer session - live position handling and alert dispatch
//!
//! The Viewer is the central event processor that coordinates:
//! - Live location display (position marker, accuracy ring, first-fix centering)
//! - Proximity checks of the sign catalog against each fix
//! - Alert delivery to the configured sinks
//! - Periodic metrics reporting
//!
//! Location events arrive over a channel and are handled one at a time, so the
//! proximity check runs exactly once per sample and never re-entrantly.

use crate::domain::alert::ProximityAlert;
use crate::domain::geo::GeometryError;
use crate::domain::projection::{Projection, WebMercator};
use crate::domain::types::{
    GeoPoint, LocationEvent, PointOfInterest, PositionSample, ProjectedPoint,
};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::egress::AlertSink;
use crate::services::catalog::SignCatalog;
use crate::services::live_location::{LiveLocation, LocationUpdate};
use crate::services::proximity_tracker::ProximityTracker;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of handling one fix
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub update: LocationUpdate,
    /// Signs that entered the alert radius with this fix, in catalog order
    pub alerts: Vec<ProximityAlert>,
}

pub struct Viewer<P: Projection = WebMercator> {
    catalog: SignCatalog,
    live: LiveLocation<P>,
    tracker: ProximityTracker,
    sinks: Vec<Box<dyn AlertSink>>,
    metrics: Arc<Metrics>,
    view_center: ProjectedPoint,
    zoom: u8,
    metrics_interval: Duration,
}

impl Viewer<WebMercator> {
    pub fn new(
        config: &Config,
        catalog: SignCatalog,
        metrics: Arc<Metrics>,
    ) -> Result<Self, GeometryError> {
        Self::with_projection(WebMercator, config, catalog, metrics)
    }
}

impl<P: Projection> Viewer<P> {
    pub fn with_projection(
        projection: P,
        config: &Config,
        catalog: SignCatalog,
        metrics: Arc<Metrics>,
    ) -> Result<Self, GeometryError> {
        let view_center =
            projection.to_projected(GeoPoint::new(config.center_lat(), config.center_lon()));
        let live = LiveLocation::with_projection(projection, config.accuracy_segments())?;

        Ok(Self {
            catalog,
            live,
            tracker: ProximityTracker::new(config.threshold_m()),
            sinks: Vec::new(),
            metrics,
            view_center,
            zoom: config.zoom(),
            metrics_interval: Duration::from_secs(config.metrics_interval_secs()),
        })
    }

    /// Register a notification sink
    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn catalog(&self) -> &SignCatalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &ProximityTracker {
        &self.tracker
    }

    pub fn view_center(&self) -> ProjectedPoint {
        self.view_center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Swap the sign collection; alert history is kept
    pub fn replace_catalog(&mut self, signs: Vec<PointOfInterest>) {
        self.catalog.replace(signs);
    }

    /// Start a new alert session
    pub fn reset_alerts(&mut self) {
        self.tracker.reset();
        self.metrics.record_reset();
    }

    /// Handle one location event; `None` when the source reported an error
    pub fn handle_event(&mut self, event: LocationEvent) -> Option<SampleOutcome> {
        match event {
            LocationEvent::Fix(sample) => Some(self.handle_fix(&sample)),
            LocationEvent::Error(message) => {
                self.metrics.record_location_error();
                warn!(error = %message, "location_error");
                None
            }
        }
    }

    pub fn handle_fix(&mut self, sample: &PositionSample) -> SampleOutcome {
        let process_start = Instant::now();

        let update = self.live.on_fix(sample);
        if let Some(center) = update.recenter {
            self.view_center = center;
        }

        // `triggered` borrows the catalog until the end of this block
        let alerts: Vec<ProximityAlert> = {
            let triggered =
                self.tracker.update_with_distance(sample.location(), self.catalog.signs());
            let session = self.tracker.session_id();
            triggered
                .iter()
                .map(|t| ProximityAlert::new(session, t.poi, sample, t.distance_m))
                .collect()
        };

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_sample_processed(latency_us);

        if !alerts.is_empty() {
            self.dispatch(&alerts);
        }

        debug!(
            lat = %sample.lat,
            lon = %sample.lon,
            alerts = %alerts.len(),
            latency_us = %latency_us,
            "sample_processed"
        );

        SampleOutcome { update, alerts }
    }

    fn dispatch(&mut self, alerts: &[ProximityAlert]) {
        let mut failed = 0u64;
        for sink in &mut self.sinks {
            let accepted = sink.send_all(alerts);
            failed += (alerts.len() - accepted) as u64;
        }
        self.metrics.record_alerts(alerts.len() as u64, failed);

        for alert in alerts {
            info!(
                poi_id = %alert.poi_id,
                class = %alert.class.as_deref().unwrap_or("-"),
                distance_m = format!("{:.1}", alert.distance_m),
                "sign_nearby"
            );
        }
    }

    /// Consume location events until the channel closes or shutdown is signalled
    pub async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<LocationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut metrics_tick = interval(self.metrics_interval);
        metrics_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        metrics_tick.tick().await;

        info!(
            signs = %self.catalog.len(),
            threshold_m = %self.tracker.threshold_m(),
            "viewer_started"
        );

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(e) => {
                            self.handle_event(e);
                        }
                        None => break, // Channel closed
                    }
                }
                _ = metrics_tick.tick() => {
                    self.metrics.report(self.tracker.alerted_count()).log();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("viewer_shutdown");
                        break;
                    }
                }
            }
        }

        self.metrics.report(self.tracker.alerted_count()).log();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PoiId, CLASS_KEY};
    use crate::io::egress::MemoryAlertSink;
    use std::sync::Mutex;

    /// Sink that shares its alerts with the test body
    struct SharedSink(Arc<Mutex<Vec<ProximityAlert>>>);

    impl AlertSink for SharedSink {
        fn send(&mut self, alert: &ProximityAlert) -> bool {
            self.0.lock().unwrap().push(alert.clone());
            true
        }
    }

    struct RejectingSink;

    impl AlertSink for RejectingSink {
        fn send(&mut self, _alert: &ProximityAlert) -> bool {
            false
        }
    }

    fn catalog() -> SignCatalog {
        SignCatalog::new(vec![
            PointOfInterest::new("home", GeoPoint::new(17.983326, 79.529158))
                .with_attribute(CLASS_KEY, "Stop"),
            PointOfInterest::new("east", GeoPoint::new(0.0, 0.001))
                .with_attribute(CLASS_KEY, "Yield"),
        ])
    }

    fn fix(lat: f64, lon: f64) -> PositionSample {
        PositionSample { lat, lon, accuracy: 6.0, timestamp: 1_000 }
    }

    fn viewer() -> (Viewer, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let viewer = Viewer::new(&Config::default(), catalog(), metrics.clone()).unwrap();
        (viewer, metrics)
    }

    #[test]
    fn test_fix_at_sign_raises_single_alert() {
        let (mut viewer, metrics) = viewer();
        let shared = Arc::new(Mutex::new(Vec::new()));
        viewer.add_sink(Box::new(SharedSink(shared.clone())));

        let outcome = viewer.handle_fix(&fix(17.983326, 79.529158));
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].poi_id, "home");
        assert_eq!(outcome.alerts[0].distance_m, 0.0);
        assert!(outcome.update.accuracy_ring.is_some());

        let again = viewer.handle_fix(&fix(17.983326, 79.529158));
        assert!(again.alerts.is_empty());

        assert_eq!(shared.lock().unwrap().len(), 1);
        assert_eq!(metrics.samples_total(), 2);
        assert_eq!(metrics.alerts_total(), 1);
    }

    #[test]
    fn test_alerts_reach_every_sink() {
        let (mut viewer, metrics) = viewer();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        viewer.add_sink(Box::new(SharedSink(first.clone())));
        viewer.add_sink(Box::new(SharedSink(second.clone())));

        let outcome = viewer.handle_fix(&fix(17.983326, 79.529158));
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].session, viewer.tracker().session_id());
        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
        assert_eq!(metrics.alerts_total(), 1);
    }

    #[test]
    fn test_nan_fix_never_alerts() {
        let (mut viewer, metrics) = viewer();
        let outcome = viewer.handle_fix(&fix(f64::NAN, 79.529158));
        assert!(outcome.alerts.is_empty());
        assert_eq!(viewer.tracker().alerted_count(), 0);
        assert_eq!(metrics.samples_total(), 1);
    }

    #[test]
    fn test_far_sign_not_alerted() {
        let (mut viewer, _) = viewer();
        let outcome = viewer.handle_fix(&fix(0.0, 0.0));
        assert!(outcome.alerts.is_empty());
        assert!(!viewer.tracker().contains(&PoiId::from("east")));
    }

    #[test]
    fn test_first_fix_moves_view_center() {
        let (mut viewer, _) = viewer();
        let initial = viewer.view_center();
        assert_eq!(viewer.zoom(), 18);

        let first = viewer.handle_fix(&fix(0.0, 0.0));
        assert_eq!(viewer.view_center(), first.update.position);
        assert_ne!(viewer.view_center(), initial);

        viewer.handle_fix(&fix(1.0, 1.0));
        assert_eq!(viewer.view_center(), first.update.position);
    }

    #[test]
    fn test_location_error_counts_without_alerts() {
        let (mut viewer, metrics) = viewer();
        assert!(viewer.handle_event(LocationEvent::Error("denied".into())).is_none());
        assert_eq!(metrics.location_errors_total(), 1);
        assert_eq!(metrics.samples_total(), 0);
    }

    #[test]
    fn test_reset_realerts() {
        let (mut viewer, _) = viewer();
        let mut memory = MemoryAlertSink::default();

        let first = viewer.handle_fix(&fix(17.983326, 79.529158));
        memory.send_all(&first.alerts);
        viewer.reset_alerts();
        let second = viewer.handle_fix(&fix(17.983326, 79.529158));
        memory.send_all(&second.alerts);

        assert_eq!(memory.alerts.len(), 2);
        assert_ne!(memory.alerts[0].session, memory.alerts[1].session);
    }

    #[test]
    fn test_rejected_alerts_counted() {
        let (mut viewer, metrics) = viewer();
        viewer.add_sink(Box::new(RejectingSink));
        viewer.handle_fix(&fix(17.983326, 79.529158));

        let summary = metrics.report(viewer.tracker().alerted_count());
        assert_eq!(summary.alerts_total, 1);
        assert_eq!(summary.alerts_failed_total, 1);
        assert_eq!(summary.alerted_signs, 1);
    }

    #[test]
    fn test_replace_catalog_keeps_history() {
        let (mut viewer, _) = viewer();
        viewer.handle_fix(&fix(17.983326, 79.529158));

        viewer.replace_catalog(vec![
            PointOfInterest::new("home", GeoPoint::new(17.983326, 79.529158)),
            PointOfInterest::new("new", GeoPoint::new(17.983330, 79.529158)),
        ]);
        let outcome = viewer.handle_fix(&fix(17.983326, 79.529158));
        let ids: Vec<&str> = outcome.alerts.iter().map(|a| a.poi_id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
        assert_eq!(viewer.catalog().len(), 2);
    }

    #[tokio::test]
    async fn test_run_consumes_until_channel_closes() {
        let (mut viewer, metrics) = viewer();
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(LocationEvent::Fix(fix(0.0, 0.0))).await.unwrap();
        tx.send(LocationEvent::Error("signal lost".into())).await.unwrap();
        tx.send(LocationEvent::Fix(fix(17.983326, 79.529158))).await.unwrap();
        drop(tx);

        viewer.run(rx, shutdown_rx).await;

        assert_eq!(metrics.samples_total(), 2);
        assert_eq!(metrics.location_errors_total(), 1);
        assert_eq!(metrics.alerts_total(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (mut viewer, _) = viewer();
        let (_tx, rx) = mpsc::channel::<LocationEvent>(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), viewer.run(rx, shutdown_rx))
            .await
            .expect("viewer should stop on shutdown");
    }
}
