//! QuakeGuard application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Start the event source gateway (HTTP poller + optional WebSocket stream)
//! 3. Feed delivered events through location, wave physics and the decision filter
//! 4. Deliver alerts through the orchestrator on the headless tracing platform

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use quakeguard_alert::{
    AlertOrchestrator, AlertPipeline, CachedLocationProvider, ChannelRegistry, TracingPlatform,
    UrgencyTier,
};
use quakeguard_core::clock::{Clock, SystemClock};
use quakeguard_core::config::QuakeConfig;
use quakeguard_core::error::{QuakeError, Result};
use quakeguard_core::events::DomainEvent;
use quakeguard_core::types::{GeoPoint, Timestamp};
use quakeguard_ingest::EventSourceGateway;
use quakeguard_physics::{intensity, ObserverSite, SeismicInput, WaveEngine};
use tokio::sync::broadcast;

use crate::cli::{CliArgs, Command, EstimateArgs};

/// Events buffered between the gateway and the alert pipeline.
const EVENT_QUEUE_CAPACITY: usize = 64;

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Mirror status events into the log until the channel closes.
async fn relay_domain_events(mut events: broadcast::Receiver<DomainEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::info!(
                event = event.event_name(),
                at = event.timestamp().0,
                detail = ?event,
                "Status"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Status relay fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run(mut config: QuakeConfig, lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    if lat.is_some() || lon.is_some() {
        config.location.home_lat = lat.or(config.location.home_lat);
        config.location.home_lon = lon.or(config.location.home_lon);
    }
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let gateway = EventSourceGateway::from_config(&config, Arc::clone(&clock))?;
    let orchestrator = AlertOrchestrator::new(
        Arc::new(TracingPlatform::new()),
        ChannelRegistry::with_defaults(),
        Arc::clone(&clock),
    );

    match config.location.home() {
        Some(home) => tracing::info!(lat = home.lat, lon = home.lon, "Observer location set"),
        None => tracing::warn!(
            "No observer location configured; wave estimates are unavailable and alerts will be suppressed"
        ),
    }
    // No device geolocation on a headless host; the configured home is used.
    let location = Arc::new(CachedLocationProvider::from_config(
        &config.location,
        None,
        Arc::clone(&clock),
    ));
    let pipeline = Arc::new(AlertPipeline::from_config(
        &config,
        location,
        orchestrator.clone(),
        Arc::clone(&clock),
    ));

    let (subscription, events) = gateway.subscribe_channel(EVENT_QUEUE_CAPACITY);
    let pipeline_task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(events).await })
    };
    let relays = [
        tokio::spawn(relay_domain_events(gateway.domain_events())),
        tokio::spawn(relay_domain_events(orchestrator.events())),
    ];

    gateway.start();
    tracing::info!(
        poll_url = %config.feed.poll_url,
        stream = config.stream.url.as_deref().unwrap_or("disabled"),
        min_magnitude = config.alerts.min_magnitude,
        "QuakeGuard running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    gateway.shutdown().await;
    // Dropping the subscription closes the pipeline's queue.
    drop(subscription);
    orchestrator.shutdown().await;
    if let Err(e) = pipeline_task.await {
        tracing::warn!(error = %e, "Alert pipeline ended abnormally");
    }
    for relay in relays {
        relay.abort();
    }

    let status = gateway.status();
    tracing::info!(
        polls_ok = status.counters.polls_ok,
        polls_failed = status.counters.polls_failed,
        events_delivered = status.counters.events_delivered,
        duplicates_suppressed = status.counters.duplicates_suppressed,
        "QuakeGuard stopped"
    );
    Ok(())
}

fn estimate(config: &QuakeConfig, args: &EstimateArgs) -> Result<()> {
    let input = SeismicInput {
        epicenter: GeoPoint::new(args.event_lat, args.event_lon),
        depth_km: args.depth,
        magnitude: args.magnitude,
        origin_time: Timestamp::now(),
        station_count: None,
    };
    let site = ObserverSite {
        vs30: args.vs30.or(config.location.site_vs30),
        ..ObserverSite::device(GeoPoint::new(args.observer_lat, args.observer_lon))
    };

    let result = WaveEngine::new().calculate(&input, &site).ok_or_else(|| {
        QuakeError::Config("event or observer parameters are out of range".into())
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let tier = UrgencyTier::classify(args.magnitude, &result);
    println!("Region:             {:?}", result.region);
    println!("Site class:         {:?}", result.site_class);
    println!(
        "Distance:           {:.1} km epicentral, {:.1} km hypocentral",
        result.epicentral_distance_km, result.hypocentral_distance_km
    );
    println!(
        "P / S arrival:      {:.1} s / {:.1} s",
        result.p_arrival_secs, result.s_arrival_secs
    );
    println!(
        "Warning time:       {:.1} s ({:.1} to {:.1} s)",
        result.warning_time_secs, result.warning_time_bounds.min, result.warning_time_bounds.max
    );
    println!(
        "Intensity:          MMI {} ({:.1} ± {:.1})",
        intensity::roman(result.estimated_intensity),
        result.estimated_intensity,
        result.intensity_uncertainty
    );
    println!(
        "PGA / PGV:          {:.3} g / {:.1} cm/s",
        result.estimated_pga_g, result.estimated_pgv_cm_s
    );
    println!(
        "Confidence:         {:.0} ({})",
        result.confidence, result.quality
    );
    println!("Alert tier:         {}", tier);
    Ok(())
}

fn check_config(path: &Path, loaded: Result<QuakeConfig>, write_default: bool) -> Result<()> {
    let config = match loaded {
        Ok(config) => config,
        Err(QuakeError::Io(e)) if write_default && e.kind() == std::io::ErrorKind::NotFound => {
            let config = QuakeConfig::default();
            config.save(path)?;
            println!("Wrote default configuration to {}", path.display());
            config
        }
        Err(e) => return Err(e),
    };
    config.validate()?;
    println!("{}: OK", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();
    let loaded = QuakeConfig::load(&config_path);

    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&args.resolve_log_filter(&config_level));

    tracing::info!("Starting QuakeGuard v{}", env!("CARGO_PKG_VERSION"));

    match args.command.clone().unwrap_or_default() {
        Command::CheckConfig { write_default } => {
            check_config(&config_path, loaded, write_default)?;
        }
        Command::Estimate(est) => {
            let config = loaded.unwrap_or_default();
            estimate(&config, &est)?;
        }
        Command::Run { lat, lon } => {
            let config = match loaded {
                Ok(config) => {
                    tracing::info!(path = %config_path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                    QuakeConfig::default()
                }
            };
            run(config, lat, lon).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_config_writes_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let loaded = QuakeConfig::load(&path);
        assert!(loaded.is_err());

        check_config(&path, loaded, true).unwrap();
        assert!(path.exists());
        assert!(QuakeConfig::load(&path).is_ok());
    }

    #[test]
    fn test_check_config_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = check_config(&path, QuakeConfig::load(&path), false).unwrap_err();
        assert!(matches!(err, QuakeError::Io(_)));
    }

    #[test]
    fn test_check_config_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[feed]\npoll_interval_secs = 1\n").unwrap();
        let err = check_config(&path, QuakeConfig::load(&path), false).unwrap_err();
        assert!(matches!(err, QuakeError::Config(_)));
    }

    fn estimate_args(event_lat: f64, json: bool) -> EstimateArgs {
        EstimateArgs {
            event_lat,
            event_lon: 29.0,
            depth: 10.0,
            magnitude: 6.0,
            observer_lat: 41.05,
            observer_lon: 29.05,
            vs30: None,
            json,
        }
    }

    #[test]
    fn test_estimate_rejects_out_of_range_input() {
        let config = QuakeConfig::default();
        let err = estimate(&config, &estimate_args(95.0, false)).unwrap_err();
        assert!(matches!(err, QuakeError::Config(_)));
        assert!(estimate(&config, &estimate_args(41.0, true)).is_ok());
    }

    #[test]
    fn test_estimate_from_parsed_arguments() {
        let args = CliArgs::parse_from([
            "quakeguard",
            "estimate",
            "--event-lat",
            "41.0",
            "--event-lon",
            "29.0",
            "--magnitude",
            "6.0",
            "--observer-lat",
            "41.05",
            "--observer-lon",
            "29.05",
            "--vs30",
            "300",
        ]);
        let Some(Command::Estimate(est)) = args.command else {
            panic!("expected the estimate subcommand");
        };
        assert_eq!(est.vs30, Some(300.0));
        assert!(estimate(&QuakeConfig::default(), &est).is_ok());
    }
}
