//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ProximityConfig {
    /// Alert radius in metres
    #[serde(default = "default_threshold_m")]
    pub threshold_m: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self { threshold_m: default_threshold_m() }
    }
}

fn default_threshold_m() -> f64 {
    20.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccuracyConfig {
    /// Segments used to draw the accuracy ring
    #[serde(default = "default_segments")]
    pub segments: usize,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self { segments: default_segments() }
    }
}

fn default_segments() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// GeoJSON dataset of detected signs
    #[serde(default = "default_predictions")]
    pub predictions: String,
    /// Where edited collections are written
    #[serde(default = "default_export")]
    pub export: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { predictions: default_predictions(), export: default_export() }
    }
}

fn default_predictions() -> String {
    "data/predictions.geojson".to_string()
}

fn default_export() -> String {
    "updated_predictions.geojson".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// JSONL file receiving triggered alerts
    #[serde(default = "default_alerts_file")]
    pub file: String,
    /// Only log alerts, skip the JSONL file
    #[serde(default)]
    pub log_only: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { file: default_alerts_file(), log_only: false }
    }
}

fn default_alerts_file() -> String {
    "alerts.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Bounded capacity of the location event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Replay samples at the pace of their timestamps
    #[serde(default)]
    pub pace: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity(), pace: false }
    }
}

fn default_channel_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            zoom: default_zoom(),
        }
    }
}

fn default_center_lat() -> f64 {
    17.983326
}

fn default_center_lon() -> f64 {
    79.529158
}

fn default_zoom() -> u8 {
    18
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub accuracy: AccuracyConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    threshold_m: f64,
    accuracy_segments: usize,
    predictions_path: String,
    export_path: String,
    alerts_file: String,
    alerts_log_only: bool,
    channel_capacity: usize,
    pace: bool,
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            threshold_m: toml_config.proximity.threshold_m,
            accuracy_segments: toml_config.accuracy.segments,
            predictions_path: toml_config.data.predictions,
            export_path: toml_config.data.export,
            alerts_file: toml_config.alerts.file,
            alerts_log_only: toml_config.alerts.log_only,
            channel_capacity: toml_config.source.channel_capacity.max(1),
            pace: toml_config.source.pace,
            center_lat: toml_config.view.center_lat,
            center_lon: toml_config.view.center_lon,
            zoom: toml_config.view.zoom,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, &path.display().to_string());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.threshold_m.is_nan() || self.threshold_m < 0.0 {
            anyhow::bail!("proximity.threshold_m must be >= 0, got {}", self.threshold_m);
        }
        if self.accuracy_segments < 3 {
            anyhow::bail!("accuracy.segments must be >= 3, got {}", self.accuracy_segments);
        }
        Ok(())
    }

    // Getters for all config fields
    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    pub fn accuracy_segments(&self) -> usize {
        self.accuracy_segments
    }

    pub fn predictions_path(&self) -> &str {
        &self.predictions_path
    }

    pub fn export_path(&self) -> &str {
        &self.export_path
    }

    pub fn alerts_file(&self) -> &str {
        &self.alerts_file
    }

    pub fn alerts_log_only(&self) -> bool {
        self.alerts_log_only
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn pace(&self) -> bool {
        self.pace
    }

    pub fn center_lat(&self) -> f64 {
        self.center_lat
    }

    pub fn center_lon(&self) -> f64 {
        self.center_lon
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for command-line overrides of the alert radius
    pub fn with_threshold_m(mut self, threshold_m: f64) -> Self {
        self.threshold_m = threshold_m;
        self
    }

    /// Builder method for command-line overrides of replay pacing
    pub fn with_pace(mut self, pace: bool) -> Self {
        self.pace = pace;
        self
    }

    /// Builder method to redirect alert egress
    pub fn with_alerts_file(mut self, file: &str) -> Self {
        self.alerts_file = file.to_string();
        self
    }

    /// Builder method to point at another sign dataset
    pub fn with_predictions_path(mut self, path: &str) -> Self {
        self.predictions_path = path.to_string();
        self
    }

    /// Builder method to change where exports land
    pub fn with_export_path(mut self, path: &str) -> Self {
        self.export_path = path.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.threshold_m(), 20.0);
        assert_eq!(config.accuracy_segments(), 64);
        assert_eq!(config.predictions_path(), "data/predictions.geojson");
        assert_eq!(config.export_path(), "updated_predictions.geojson");
        assert_eq!(config.alerts_file(), "alerts.jsonl");
        assert!(!config.alerts_log_only());
        assert_eq!(config.channel_capacity(), 256);
        assert!(!config.pace());
        assert_eq!(config.center_lat(), 17.983326);
        assert_eq!(config.center_lon(), 79.529158);
        assert_eq!(config.zoom(), 18);
        assert_eq!(config.metrics_interval_secs(), 10);
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("[proximity]\nthreshold_m = 35.5\n").unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.threshold_m(), 35.5);
        assert_eq!(config.accuracy_segments(), 64);
        assert_eq!(config.config_file(), "inline");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let content = "[source]\nchannel_capacity = 0\n[metrics]\ninterval_secs = 0\n";
        let toml_config: TomlConfig = toml::from_str(content).unwrap();
        let config = Config::from_toml(toml_config, "inline");
        assert_eq!(config.channel_capacity(), 1);
        assert_eq!(config.metrics_interval_secs(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config::default().with_threshold_m(-1.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.accuracy_segments = 2;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_threshold_m(5.0)
            .with_pace(true)
            .with_alerts_file("out/a.jsonl")
            .with_predictions_path("p.geojson")
            .with_export_path("e.geojson");
        assert_eq!(config.threshold_m(), 5.0);
        assert!(config.pace());
        assert_eq!(config.alerts_file(), "out/a.jsonl");
        assert_eq!(config.predictions_path(), "p.geojson");
        assert_eq!(config.export_path(), "e.geojson");
    }

    #[test]
    fn test_resolve_config_path_default() {
        let args: Vec<String> = vec!["signwatch".to_string()];
        // CONFIG_FILE may be set in the environment running the tests
        if env::var("CONFIG_FILE").is_err() {
            assert_eq!(Config::resolve_config_path(&args), "config/dev.toml");
        }
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> = vec![
            "signwatch".to_string(),
            "--config".to_string(),
            "config/field.toml".to_string(),
        ];
        assert_eq!(Config::resolve_config_path(&args), "config/field.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> =
            vec!["signwatch".to_string(), "--config=config/survey.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/survey.toml");
    }
}
