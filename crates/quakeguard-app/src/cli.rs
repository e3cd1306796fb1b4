//! CLI argument definitions for the QuakeGuard application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// QuakeGuard: earthquake early warning from public seismic feeds.
#[derive(Parser, Debug)]
#[command(name = "quakeguard", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Ingest events and deliver alerts until interrupted (the default).
    Run {
        /// Observer latitude, overriding `[location].home_lat`.
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Observer longitude, overriding `[location].home_lon`.
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Estimate arrivals and shaking for one hypothetical event.
    Estimate(EstimateArgs),
    /// Validate the configuration file and print the effective settings.
    CheckConfig {
        /// Write a default configuration file if none exists.
        #[arg(long)]
        write_default: bool,
    },
}

/// One hypothetical event and the observer it is estimated for.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct EstimateArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub event_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub event_lon: f64,
    /// Hypocenter depth in km.
    #[arg(long, default_value_t = 10.0)]
    pub depth: f64,
    #[arg(long)]
    pub magnitude: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub observer_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub observer_lon: f64,
    /// Site Vs30 in m/s, overriding `[location].site_vs30`.
    #[arg(long)]
    pub vs30: Option<f64>,
    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl Default for Command {
    fn default() -> Self {
        Command::Run {
            lat: None,
            lon: None,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > QUAKEGUARD_CONFIG env var > ~/.quakeguard/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("QUAKEGUARD_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the tracing filter directive.
    ///
    /// Priority: RUST_LOG > --log-level flag > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".quakeguard").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".quakeguard").join("config.toml");
    }
    PathBuf::from("config.toml")
}
