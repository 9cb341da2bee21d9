//! Alert egress - hands triggered proximity alerts to notification sinks
//!
//! The core only decides which signs to announce; sinks decide how. The file
//! sink writes JSONL (one JSON object per line), the log sink emits a
//! structured log line per alert.

use crate::domain::alert::ProximityAlert;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Receiver of newly triggered proximity alerts
pub trait AlertSink: Send {
    /// Deliver one alert; returns true if it was accepted
    fn send(&mut self, alert: &ProximityAlert) -> bool;

    /// Deliver several alerts, returning how many were accepted
    fn send_all(&mut self, alerts: &[ProximityAlert]) -> usize {
        alerts.iter().filter(|alert| self.send(alert)).count()
    }
}

/// Egress writer for alerts (JSONL file)
pub struct JsonlAlertSink {
    file_path: String,
}

impl JsonlAlertSink {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "alert_egress_initialized");
        Self { file_path: file_path.to_string() }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "alert_egress_written");

        Ok(())
    }
}

impl AlertSink for JsonlAlertSink {
    fn send(&mut self, alert: &ProximityAlert) -> bool {
        match self.append_line(&alert.to_json()) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    poi_id = %alert.poi_id,
                    error = %e,
                    "alert_egress_failed"
                );
                false
            }
        }
    }
}

/// Announces alerts through the log only
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&mut self, alert: &ProximityAlert) -> bool {
        info!(
            poi_id = %alert.poi_id,
            class = %alert.class.as_deref().unwrap_or("-"),
            distance_m = format!("{:.1}", alert.distance_m),
            session = %alert.session,
            message = %alert.message(),
            "proximity_alert"
        );
        true
    }
}

/// Collects alerts in memory
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    pub alerts: Vec<ProximityAlert>,
}

impl AlertSink for MemoryAlertSink {
    fn send(&mut self, alert: &ProximityAlert) -> bool {
        self.alerts.push(alert.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{GeoPoint, PointOfInterest, PositionSample, CLASS_KEY};
    use std::fs;
    use tempfile::tempdir;

    fn alert(id: &str) -> ProximityAlert {
        let poi = PointOfInterest::new(id, GeoPoint::new(17.9833, 79.5291))
            .with_attribute(CLASS_KEY, "Stop");
        let sample = PositionSample { lat: 17.9833, lon: 79.5291, accuracy: 5.0, timestamp: 1000 };
        ProximityAlert::new("session-1", &poi, &sample, 3.2)
    }

    #[test]
    fn test_sink_new() {
        let sink = JsonlAlertSink::new("alerts.jsonl");
        assert_eq!(sink.file_path(), "alerts.jsonl");
    }

    #[test]
    fn test_write_alert() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("alerts.jsonl");
        let mut sink = JsonlAlertSink::new(file_path.to_str().unwrap());

        assert!(sink.send(&alert("s1")));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["poi_id"], "s1");
        assert_eq!(parsed["class"], "Stop");
        assert_eq!(parsed["session"], "session-1");
        assert_eq!(parsed["sample_ts"], 1000);
    }

    #[test]
    fn test_send_all_appends_lines() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("alerts.jsonl");
        fs::write(&file_path, "{\"existing\":\"data\"}\n").unwrap();

        let mut sink = JsonlAlertSink::new(file_path.to_str().unwrap());
        let count = sink.send_all(&[alert("a"), alert("b"), alert("c")]);
        assert_eq!(count, 3);

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("existing"));
        for line in &lines[1..] {
            let _parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("dir").join("alerts.jsonl");
        let mut sink = JsonlAlertSink::new(nested.to_str().unwrap());

        assert!(sink.send(&alert("s1")));
        assert!(nested.exists());
    }

    #[test]
    fn test_unwritable_path_reports_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending
        let mut sink = JsonlAlertSink::new(dir.path().to_str().unwrap());
        assert!(!sink.send(&alert("s1")));
    }

    #[test]
    fn test_log_and_memory_sinks() {
        assert!(LogAlertSink.send(&alert("s1")));

        let mut memory = MemoryAlertSink::default();
        assert_eq!(memory.send_all(&[alert("a"), alert("b")]), 2);
        assert_eq!(memory.alerts[1].poi_id, "b");
    }
}
