//! Recorded location source
//!
//! Replays position samples from a JSONL track (file or stdin) into the
//! viewer's event channel, one event per line:
//!
//! ```text
//! {"lat": 17.983326, "lon": 79.529158, "accuracy": 6.5, "timestamp": 1709287200000}
//! {"error": "position unavailable"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use crate::domain::types::{LocationEvent, PositionSample};
use crate::infra::metrics::Metrics;
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Longest pause inserted between paced samples
const MAX_PACE_GAP: Duration = Duration::from_secs(10);

/// Parse one track line; `None` for blank and comment lines
pub fn parse_line(line: &str) -> Option<anyhow::Result<LocationEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return Some(Err(anyhow!(e).context("Invalid JSON in track line"))),
    };

    if let Some(error) = value.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Some(Ok(LocationEvent::Error(message)));
    }

    Some(
        serde_json::from_value::<PositionSample>(value)
            .map(LocationEvent::Fix)
            .context("Invalid position sample"),
    )
}

/// Replays a recorded track into the event channel
pub struct TrackReplay {
    path: String,
    pace: bool,
    metrics: Arc<Metrics>,
}

impl TrackReplay {
    /// `path` of `-` reads from stdin
    pub fn new(path: &str, pace: bool, metrics: Arc<Metrics>) -> Self {
        Self { path: path.to_string(), pace, metrics }
    }

    async fn open(&self) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        if self.path == "-" {
            return Ok(Box::new(BufReader::new(tokio::io::stdin())));
        }
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open track {}", self.path))?;
        Ok(Box::new(BufReader::new(file)))
    }

    /// Stream every event to `event_tx`; returns how many events were delivered
    ///
    /// Unpaced replay waits for channel capacity. Paced replay behaves like a
    /// live sensor and drops samples when the consumer falls behind.
    pub async fn run(
        self,
        event_tx: mpsc::Sender<LocationEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<usize> {
        let reader = self.open().await?;
        let mut lines = reader.lines();
        let mut delivered = 0usize;
        let mut last_ts: Option<u64> = None;
        // Rate-limit drop warnings to 1 per second
        let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

        info!(path = %self.path, pace = %self.pace, "track_replay_started");

        loop {
            let next = tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!(delivered = %delivered, "track_replay_shutdown");
                        return Ok(delivered);
                    }
                    continue;
                }
                next = lines.next_line() => next,
            };

            let read = next.with_context(|| format!("Failed to read track {}", self.path))?;
            let Some(line) = read else { break };

            let event = match parse_line(&line) {
                None => continue,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(error = %format!("{e:#}"), line = %line, "track_line_skipped");
                    continue;
                }
            };

            if self.pace {
                if let LocationEvent::Fix(sample) = &event {
                    if let Some(prev) = last_ts {
                        let gap = Duration::from_millis(sample.timestamp.saturating_sub(prev));
                        if !pause_unless_shutdown(gap.min(MAX_PACE_GAP), &mut shutdown).await {
                            info!(delivered = %delivered, "track_replay_shutdown");
                            return Ok(delivered);
                        }
                    }
                    last_ts = Some(sample.timestamp);
                }

                match event_tx.try_send(event) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.metrics.record_sample_dropped();
                        if last_drop_warn.elapsed() > Duration::from_secs(1) {
                            warn!("location_event_dropped: channel full");
                            last_drop_warn = Instant::now();
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!("location_event_channel_closed");
                        break;
                    }
                }
            } else if event_tx.send(event).await.is_ok() {
                delivered += 1;
            } else {
                warn!("location_event_channel_closed");
                break;
            }
        }

        debug!(path = %self.path, delivered = %delivered, "track_replay_finished");
        Ok(delivered)
    }
}

/// Sleep for `gap`; returns false if shutdown was signalled first
async fn pause_unless_shutdown(gap: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(gap);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_fix() {
        let event = parse_line(r#"{"lat": 1.5, "lon": 2.5, "accuracy": 3.0, "timestamp": 10}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            LocationEvent::Fix(PositionSample { lat: 1.5, lon: 2.5, accuracy: 3.0, timestamp: 10 })
        );
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse_line(r#"{"error": "permission denied"}"#).unwrap().unwrap();
        assert_eq!(event, LocationEvent::Error("permission denied".to_string()));

        let event = parse_line(r#"{"error": {"code": 1}}"#).unwrap().unwrap();
        assert!(matches!(event, LocationEvent::Error(msg) if msg.contains("code")));
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# recorded on site").is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("{not json").unwrap().is_err());
        assert!(parse_line(r#"{"lat": 1.0}"#).unwrap().is_err());
    }

    fn track_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_replay_delivers_events_in_order() {
        let file = track_file(&[
            r#"{"lat": 0.0, "lon": 0.0, "accuracy": 5.0, "timestamp": 1}"#,
            "# comment",
            r#"{"error": "signal lost"}"#,
            "garbage",
            r#"{"lat": 0.0, "lon": 0.001, "accuracy": 5.0, "timestamp": 2}"#,
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let path = file.path().to_str().unwrap();
        let replay = TrackReplay::new(path, false, Arc::new(Metrics::new()));
        let delivered = replay.run(tx, shutdown_rx).await.unwrap();
        assert_eq!(delivered, 3);

        assert!(matches!(rx.recv().await, Some(LocationEvent::Fix(s)) if s.timestamp == 1));
        assert!(matches!(rx.recv().await, Some(LocationEvent::Error(_))));
        assert!(matches!(rx.recv().await, Some(LocationEvent::Fix(s)) if s.timestamp == 2));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_paced_replay_drops_when_full() {
        let file = track_file(&[
            r#"{"lat": 0.0, "lon": 0.0, "timestamp": 100}"#,
            r#"{"lat": 0.0, "lon": 0.0, "timestamp": 100}"#,
            r#"{"lat": 0.0, "lon": 0.0, "timestamp": 100}"#,
        ]);
        let (tx, _rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(Metrics::new());

        let replay = TrackReplay::new(file.path().to_str().unwrap(), true, metrics.clone());
        let delivered = replay.run(tx, shutdown_rx).await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(metrics.samples_dropped(), 2);
    }

    #[tokio::test]
    async fn test_paced_replay_stops_during_gap() {
        let file = track_file(&[
            r#"{"lat": 0.0, "lon": 0.0, "timestamp": 0}"#,
            r#"{"lat": 0.0, "lon": 0.0, "timestamp": 60000}"#,
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let path = file.path().to_str().unwrap();
        let replay = TrackReplay::new(path, true, Arc::new(Metrics::new()));
        let handle = tokio::spawn(replay.run(tx, shutdown_rx));

        // First sample arrives immediately, then replay waits out the capped gap
        assert!(matches!(rx.recv().await, Some(LocationEvent::Fix(s)) if s.timestamp == 0));
        shutdown_tx.send(true).unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("replay should stop without waiting out the gap")
            .unwrap()
            .unwrap();
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn test_missing_track_file() {
        let (tx, _rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let replay = TrackReplay::new("/nonexistent/track.jsonl", false, Arc::new(Metrics::new()));
        assert!(replay.run(tx, shutdown_rx).await.is_err());
    }
}
