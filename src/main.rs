//! signwatch - road sign map viewer core
//!
//! Loads detected road signs from GeoJSON, follows a live (or recorded)
//! position and raises a one-shot alert when the user comes within range of
//! a sign. Also exposes the catalog operations of the viewer: class list,
//! filtering, class edits and export.
//!
//! Module structure:
//! - `domain/` - Core types (GeoPoint, PointOfInterest, ProximityAlert) and geometry
//! - `io/` - External interfaces (GeoJSON, track replay, alert egress)
//! - `services/` - Business logic (Viewer, ProximityTracker, SignCatalog)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use signwatch::domain::{
    circular_polygon, haversine_distance_meters, GeoPoint, PoiId, Projection, WebMercator,
};
use signwatch::infra::{Config, Metrics};
use signwatch::io::{load_catalog, write_signs, JsonlAlertSink, LogAlertSink, TrackReplay};
use signwatch::services::{image_path, ImageMode, SignFilter, Viewer};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// signwatch - proximity alerts for detected road signs
#[derive(Parser, Debug)]
#[command(
    name = "signwatch",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about
)]
struct Args {
    /// Path to TOML configuration file
    ///
    /// Falls back to the CONFIG_FILE environment variable, then config/dev.toml.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Sign dataset (GeoJSON), overrides data.predictions
    #[arg(short, long, global = true)]
    predictions: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a position track against the sign catalog and emit alerts
    Watch {
        /// JSONL track file, `-` for stdin
        track: String,

        /// Alert radius in meters
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Replay at the recorded sample rate
        #[arg(long)]
        pace: bool,

        /// Alert output file (JSONL), overrides alerts.file
        #[arg(long)]
        alerts_file: Option<String>,
    },

    /// Print the distinct sign classes
    Classes,

    /// List signs matching a class and date range
    Filter {
        /// Sign class, "all" for any
        #[arg(long)]
        class: Option<String>,

        /// First day (YYYY-MM-DD), inclusive
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: Option<String>,

        /// Picture to list per sign: "real" or "icon"
        #[arg(long, default_value = "real")]
        images: ImageMode,

        /// Also write the matches as GeoJSON
        #[arg(long)]
        out: Option<String>,
    },

    /// Change the class of one sign and write the updated collection
    Edit {
        /// Sign id
        #[arg(long)]
        id: String,

        /// New class
        #[arg(long)]
        class: String,

        /// Output file, overrides data.export
        #[arg(long)]
        out: Option<String>,
    },

    /// Write the sign collection as GeoJSON
    Export {
        /// Output file, overrides data.export
        #[arg(long)]
        out: Option<String>,
    },

    /// Great-circle distance in meters between two positions
    #[command(allow_negative_numbers = true)]
    Distance { lat1: f64, lon1: f64, lat2: f64, lon2: f64 },

    /// Circle polygon around a position, in Web Mercator meters
    #[command(allow_negative_numbers = true)]
    Circle {
        lat: f64,
        lon: f64,

        /// Radius in meters
        radius: f64,

        /// Number of segments, overrides accuracy.segments
        #[arg(short, long)]
        segments: Option<usize>,

        /// Print the ring as lat/lon instead of projected x/y
        #[arg(long)]
        geographic: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-sample visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(|| Config::resolve_config_path(&[]));
    let mut config = Config::load_from_path(&config_path);
    if let Some(path) = &args.predictions {
        config = config.with_predictions_path(path);
    }

    match args.command {
        Command::Watch { track, threshold, pace, alerts_file } => {
            if let Some(threshold) = threshold {
                if threshold.is_nan() || threshold < 0.0 {
                    bail!("threshold must be >= 0, got {threshold}");
                }
                config = config.with_threshold_m(threshold);
            }
            if pace {
                config = config.with_pace(true);
            }
            if let Some(file) = &alerts_file {
                config = config.with_alerts_file(file);
            }
            run_watch(config, &track).await
        }
        Command::Classes => {
            let catalog = load_catalog(config.predictions_path())?;
            for class in catalog.classes() {
                println!("{class}");
            }
            Ok(())
        }
        Command::Filter { class, from, to, images, out } => {
            let catalog = load_catalog(config.predictions_path())?;
            let filter = SignFilter::from_input(class.as_deref(), from.as_deref(), to.as_deref())?;
            let matches = catalog.filter(&filter);

            for sign in &matches {
                println!(
                    "{}\t{}\t{:.6}\t{:.6}\t{}",
                    sign.id,
                    sign.class().unwrap_or("-"),
                    sign.location.lat,
                    sign.location.lon,
                    image_path(sign, images).unwrap_or_else(|| "-".to_string())
                );
            }
            info!(matched = %matches.len(), total = %catalog.len(), "signs_filtered");

            if let Some(out) = out {
                let written = write_signs(&out, matches)?;
                info!(path = %out, signs = %written, "filtered_signs_written");
            }
            Ok(())
        }
        Command::Edit { id, class, out } => {
            let mut catalog = load_catalog(config.predictions_path())?;
            let previous = catalog.set_class(&PoiId::from(id.as_str()), &class)?;
            println!("{id}\t{} -> {}", previous.as_deref().unwrap_or("-"), class.trim());

            let path = out.unwrap_or_else(|| config.export_path().to_string());
            let written = write_signs(&path, catalog.signs())?;
            info!(path = %path, signs = %written, "signs_exported");
            Ok(())
        }
        Command::Export { out } => {
            let catalog = load_catalog(config.predictions_path())?;
            let path = out.unwrap_or_else(|| config.export_path().to_string());
            let written = write_signs(&path, catalog.signs())?;
            info!(path = %path, signs = %written, "signs_exported");
            Ok(())
        }
        Command::Distance { lat1, lon1, lat2, lon2 } => {
            let meters =
                haversine_distance_meters(GeoPoint::new(lat1, lon1), GeoPoint::new(lat2, lon2));
            println!("{meters:.3}");
            Ok(())
        }
        Command::Circle { lat, lon, radius, segments, geographic } => {
            let projection = WebMercator;
            let center = projection.to_projected(GeoPoint::new(lat, lon));
            let segments = segments.unwrap_or(config.accuracy_segments());
            let ring = circular_polygon(center, radius, segments)?;

            let coords: Vec<[f64; 2]> = ring
                .into_iter()
                .map(|p| {
                    if geographic {
                        let g = projection.to_geographic(p);
                        [g.lon, g.lat]
                    } else {
                        [p.x, p.y]
                    }
                })
                .collect();
            println!("{}", serde_json::to_string(&coords).context("Failed to encode ring")?);
            Ok(())
        }
    }
}

async fn run_watch(config: Config, track: &str) -> anyhow::Result<()> {
    info!("signwatch starting");

    info!(
        config_file = %config.config_file(),
        predictions = %config.predictions_path(),
        threshold_m = %config.threshold_m(),
        accuracy_segments = %config.accuracy_segments(),
        alerts_file = %config.alerts_file(),
        alerts_log_only = %config.alerts_log_only(),
        pace = %config.pace(),
        "config_loaded"
    );

    let catalog = load_catalog(config.predictions_path())?;
    let metrics = Arc::new(Metrics::new());

    let mut viewer = Viewer::new(&config, catalog, metrics.clone())?;
    if config.alerts_log_only() {
        viewer.add_sink(Box::new(LogAlertSink));
    } else {
        viewer.add_sink(Box::new(JsonlAlertSink::new(config.alerts_file())));
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create event channel (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(config.channel_capacity());

    // Start track replay
    let replay = TrackReplay::new(track, config.pace(), metrics);
    let replay_shutdown = shutdown_rx.clone();
    let replay_handle = tokio::spawn(async move { replay.run(event_tx, replay_shutdown).await });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    // Run viewer - consumes events until the replay finishes or shutdown
    viewer.run(event_rx, shutdown_rx).await;

    match replay_handle.await {
        Ok(Ok(delivered)) => info!(events = %delivered, "track_replay_complete"),
        Ok(Err(e)) => return Err(e),
        Err(e) => error!(error = %e, "track_replay_task_failed"),
    }

    info!(alerted_signs = %viewer.tracker().alerted_count(), "signwatch shutdown complete");
    Ok(())
}
