use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuakeError, Result};
use crate::types::{ChannelSet, GeoPoint};

/// Lowest poll cadence the poller will run at, regardless of configuration.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Upper bound on the seen-event cache.
pub const MAX_DEDUP_CAPACITY: usize = 1000;

/// Top-level configuration for QuakeGuard.
///
/// Loaded from `~/.quakeguard/config.toml` by default. Each section
/// corresponds to one stage of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuakeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl QuakeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuakeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| QuakeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check value ranges that TOML typing alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.feed.poll_url.trim().is_empty() {
            return Err(QuakeError::Config("feed.poll_url must not be empty".into()));
        }
        if self.feed.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(QuakeError::Config(format!(
                "feed.poll_interval_secs must be at least {}",
                MIN_POLL_INTERVAL_SECS
            )));
        }
        if self.feed.request_timeout_secs == 0 || self.feed.request_timeout_secs > 60 {
            return Err(QuakeError::Config(
                "feed.request_timeout_secs must be within 1..=60".into(),
            ));
        }
        if self.stream.max_reconnect_attempts == 0 {
            return Err(QuakeError::Config(
                "stream.max_reconnect_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=10.0).contains(&self.alerts.min_magnitude) {
            return Err(QuakeError::Config(
                "alerts.min_magnitude must be within 0..=10".into(),
            ));
        }
        if self.dedup.capacity == 0 || self.dedup.capacity > MAX_DEDUP_CAPACITY {
            return Err(QuakeError::Config(format!(
                "dedup.capacity must be within 1..={}",
                MAX_DEDUP_CAPACITY
            )));
        }
        if let (Some(lat), Some(lon)) = (self.location.home_lat, self.location.home_lon) {
            if !GeoPoint::new(lat, lon).is_valid() {
                return Err(QuakeError::Config(
                    "location.home_lat/home_lon out of range".into(),
                ));
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP polling feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Time-windowed event endpoint.
    pub poll_url: String,
    /// Seconds between polls. Floored at 5.
    pub poll_interval_secs: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Rolling window requested on every poll.
    pub window_minutes: u32,
    /// Maximum items requested per poll.
    pub result_limit: u32,
    /// Source label stamped on events that do not carry their own.
    pub source_name: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_url: "https://api.orhanaydogdu.com.tr/deprem/kandilli/live".to_string(),
            poll_interval_secs: 10,
            request_timeout_secs: 12,
            window_minutes: 60,
            result_limit: 100,
            source_name: "kandilli".to_string(),
        }
    }
}

/// Persistent WebSocket feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Whether to run the stream listener alongside the poller.
    pub enabled: bool,
    /// WebSocket endpoint. The listener is not started when unset.
    pub url: Option<String>,
    /// Reconnect delay is `reconnect_base_delay_ms * attempt`.
    pub reconnect_base_delay_ms: u64,
    /// Consecutive failures after which the listener stops for good.
    pub max_reconnect_attempts: u32,
    /// Seconds between `{"type":"ping"}` heartbeats.
    pub heartbeat_interval_secs: u64,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout_secs: u64,
    /// Source label for events received on the stream.
    pub source_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            reconnect_base_delay_ms: 2_000,
            max_reconnect_attempts: 5,
            heartbeat_interval_secs: 25,
            connect_timeout_secs: 12,
            source_name: "stream".to_string(),
        }
    }
}

/// User alert preferences and decision thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Master switch for early-warning alerts.
    pub enabled: bool,
    /// Whether the user allows notifications at all.
    pub notifications_enabled: bool,
    /// Events below this magnitude never alert.
    pub min_magnitude: f64,
    /// Events older than this are treated as stale.
    pub max_event_age_secs: u64,
    /// Per-channel user preferences.
    pub channels: ChannelSet,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notifications_enabled: true,
            min_magnitude: 3.0,
            max_event_age_secs: 300,
            channels: ChannelSet::default(),
        }
    }
}

/// Observer location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fallback latitude used when no device fix is available.
    pub home_lat: Option<f64>,
    /// Fallback longitude used when no device fix is available.
    pub home_lon: Option<f64>,
    /// How long a device fix is reused before asking again.
    pub cache_ttl_secs: u64,
    /// Time-averaged shear-wave velocity of the top 30 m at the observer (m/s).
    pub site_vs30: Option<f64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            home_lat: None,
            home_lon: None,
            cache_ttl_secs: 60,
            site_vs30: None,
        }
    }
}

impl LocationConfig {
    pub fn home(&self) -> Option<GeoPoint> {
        match (self.home_lat, self.home_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

/// Seen-event cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_DEDUP_CAPACITY,
        }
    }
}
