//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! All atomics use Relaxed ordering: these are statistical counters only and
//! must not drive alerting decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120
const BUCKET_BOUNDS: [u64; 10] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120, 10240];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Position samples processed (monotonic)
    samples_total: AtomicU64,
    /// Samples since last report (reset on report)
    samples_since_report: AtomicU64,
    /// Location source errors (monotonic)
    location_errors_total: AtomicU64,
    /// Proximity alerts raised (monotonic)
    alerts_total: AtomicU64,
    /// Alerts a sink refused (monotonic)
    alerts_failed_total: AtomicU64,
    /// Alert record resets (monotonic)
    resets_total: AtomicU64,
    /// Samples dropped because the event channel was full (monotonic)
    samples_dropped: AtomicU64,
    /// Sum of update latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max update latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Update latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            samples_total: AtomicU64::new(0),
            samples_since_report: AtomicU64::new(0),
            location_errors_total: AtomicU64::new(0),
            alerts_total: AtomicU64::new(0),
            alerts_failed_total: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record one processed sample and how long the proximity check took
    pub fn record_sample_processed(&self, latency_us: u64) {
        self.samples_total.fetch_add(1, Ordering::Relaxed);
        self.samples_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_location_error(&self) {
        self.location_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alerts(&self, raised: u64, failed: u64) {
        self.alerts_total.fetch_add(raised, Ordering::Relaxed);
        self.alerts_failed_total.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_total(&self) -> u64 {
        self.samples_total.load(Ordering::Relaxed)
    }

    pub fn location_errors_total(&self) -> u64 {
        self.location_errors_total.load(Ordering::Relaxed)
    }

    pub fn alerts_total(&self) -> u64 {
        self.alerts_total.load(Ordering::Relaxed)
    }

    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }

    /// Generate a report snapshot
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, alerted_signs: usize) -> MetricsSummary {
        let samples_count = self.samples_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let samples_per_sec = if elapsed.as_secs_f64() > 0.0 {
            samples_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if samples_count > 0 { latency_sum / samples_count } else { 0 };

        MetricsSummary {
            samples_total: self.samples_total.load(Ordering::Relaxed),
            samples_per_sec,
            avg_update_latency_us: avg_latency,
            max_update_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            location_errors_total: self.location_errors_total.load(Ordering::Relaxed),
            alerts_total: self.alerts_total.load(Ordering::Relaxed),
            alerts_failed_total: self.alerts_failed_total.load(Ordering::Relaxed),
            resets_total: self.resets_total.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            alerted_signs,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub samples_total: u64,
    pub samples_per_sec: f64,
    pub avg_update_latency_us: u64,
    pub max_update_latency_us: u64,
    /// Update latency histogram buckets
    /// Bounds: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub location_errors_total: u64,
    pub alerts_total: u64,
    pub alerts_failed_total: u64,
    pub resets_total: u64,
    pub samples_dropped: u64,
    /// Signs alerted in the current session
    pub alerted_signs: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            samples_total = %self.samples_total,
            samples_per_sec = format!("{:.1}", self.samples_per_sec),
            avg_latency_us = %self.avg_update_latency_us,
            max_latency_us = %self.max_update_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            location_errors = %self.location_errors_total,
            alerts = %self.alerts_total,
            alerts_failed = %self.alerts_failed_total,
            resets = %self.resets_total,
            dropped = %self.samples_dropped,
            alerted_signs = %self.alerted_signs,
            "metrics"
        );
    }
}
