use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Time and Geography
// =============================================================================

/// Milliseconds since the Unix epoch (UTC).
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    /// Milliseconds elapsed between `self` and `now`. Negative for future instants.
    pub fn age_ms(&self, now: Timestamp) -> i64 {
        now.0 - self.0
    }
}

/// A point on the Earth's surface in decimal degrees (WGS84).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both coordinates are finite and inside `[-90,90]` / `[-180,180]`.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

// =============================================================================
// Seismic Events
// =============================================================================

/// Physical bounds accepted for a canonical event.
pub const MAGNITUDE_RANGE: (f64, f64) = (0.0, 10.0);
pub const DEPTH_RANGE_KM: (f64, f64) = (0.0, 700.0);

/// How much an event report can be trusted for alerting at a given distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certainty {
    Low,
    Medium,
    High,
}

impl fmt::Display for Certainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Certainty::Low => write!(f, "low"),
            Certainty::Medium => write!(f, "medium"),
            Certainty::High => write!(f, "high"),
        }
    }
}

/// Canonical event shape produced by the normalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Unique per source.
    pub id: String,
    pub epicenter: GeoPoint,
    /// Within [`MAGNITUDE_RANGE`].
    pub magnitude: f64,
    /// Within [`DEPTH_RANGE_KM`].
    pub depth_km: f64,
    pub region: String,
    pub source: String,
    pub origin_time: Timestamp,
    /// Number of stations that contributed to the solution, when reported.
    pub station_count: Option<u32>,
}

// =============================================================================
// Alerts
// =============================================================================

/// Alert priority. Ordering is significant: a strictly higher priority
/// preempts the active alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertPriority::Low => write!(f, "low"),
            AlertPriority::Normal => write!(f, "normal"),
            AlertPriority::High => write!(f, "high"),
            AlertPriority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(AlertPriority::Low),
            "normal" => Ok(AlertPriority::Normal),
            "high" => Ok(AlertPriority::High),
            "critical" => Ok(AlertPriority::Critical),
            _ => Err(format!("Unknown alert priority: {}", s)),
        }
    }
}

/// A notification channel an alert can be delivered through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Push,
    FullScreen,
    AlarmSound,
    Vibration,
    Led,
    Tts,
    Bluetooth,
}

impl AlertChannel {
    pub const ALL: [AlertChannel; 7] = [
        AlertChannel::Push,
        AlertChannel::FullScreen,
        AlertChannel::AlarmSound,
        AlertChannel::Vibration,
        AlertChannel::Led,
        AlertChannel::Tts,
        AlertChannel::Bluetooth,
    ];
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertChannel::Push => write!(f, "push"),
            AlertChannel::FullScreen => write!(f, "full_screen"),
            AlertChannel::AlarmSound => write!(f, "alarm_sound"),
            AlertChannel::Vibration => write!(f, "vibration"),
            AlertChannel::Led => write!(f, "led"),
            AlertChannel::Tts => write!(f, "tts"),
            AlertChannel::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

/// Per-channel enablement map.
///
/// Used both for user preferences and for the channels an alert request
/// asks for. Missing fields in a config file default to enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSet {
    pub push: bool,
    pub full_screen: bool,
    pub alarm_sound: bool,
    pub vibration: bool,
    pub led: bool,
    pub tts: bool,
    pub bluetooth: bool,
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::all()
    }
}

impl ChannelSet {
    pub fn all() -> Self {
        Self {
            push: true,
            full_screen: true,
            alarm_sound: true,
            vibration: true,
            led: true,
            tts: true,
            bluetooth: true,
        }
    }

    pub fn none() -> Self {
        Self {
            push: false,
            full_screen: false,
            alarm_sound: false,
            vibration: false,
            led: false,
            tts: false,
            bluetooth: false,
        }
    }

    /// Build a set with exactly the given channels enabled.
    pub fn of(channels: &[AlertChannel]) -> Self {
        let mut set = Self::none();
        for channel in channels {
            set.set(*channel, true);
        }
        set
    }

    pub fn is_enabled(&self, channel: AlertChannel) -> bool {
        match channel {
            AlertChannel::Push => self.push,
            AlertChannel::FullScreen => self.full_screen,
            AlertChannel::AlarmSound => self.alarm_sound,
            AlertChannel::Vibration => self.vibration,
            AlertChannel::Led => self.led,
            AlertChannel::Tts => self.tts,
            AlertChannel::Bluetooth => self.bluetooth,
        }
    }

    pub fn set(&mut self, channel: AlertChannel, enabled: bool) {
        match channel {
            AlertChannel::Push => self.push = enabled,
            AlertChannel::FullScreen => self.full_screen = enabled,
            AlertChannel::AlarmSound => self.alarm_sound = enabled,
            AlertChannel::Vibration => self.vibration = enabled,
            AlertChannel::Led => self.led = enabled,
            AlertChannel::Tts => self.tts = enabled,
            AlertChannel::Bluetooth => self.bluetooth = enabled,
        }
    }

    /// Channels enabled in both sets. Never enables anything `other` disables.
    pub fn intersect(&self, other: &ChannelSet) -> ChannelSet {
        let mut out = ChannelSet::none();
        for channel in AlertChannel::ALL {
            out.set(channel, self.is_enabled(channel) && other.is_enabled(channel));
        }
        out
    }

    pub fn enabled(&self) -> Vec<AlertChannel> {
        AlertChannel::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().is_empty()
    }
}

/// A fully composed alert, ready for the delivery orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub title: String,
    pub body: String,
    pub priority: AlertPriority,
    pub channels: ChannelSet,
    pub custom_sound: Option<String>,
    /// Alternating on/off durations in milliseconds.
    pub vibration_pattern: Option<Vec<u64>>,
    pub speech_text: Option<String>,
    /// Opaque data forwarded to the platform with the notification.
    pub payload: serde_json::Value,
    /// Seconds until the alert is torn down automatically. 0 persists until dismissed.
    pub duration_secs: u64,
}

impl AlertRequest {
    /// A minimal request; callers fill optional fields as needed.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        priority: AlertPriority,
        channels: ChannelSet,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority,
            channels,
            custom_sound: None,
            vibration_pattern: None,
            speech_text: None,
            payload: serde_json::Value::Null,
            duration_secs: 0,
        }
    }
}

// =============================================================================
// Observer Location
// =============================================================================

/// Where an observer fix came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Live device geolocation.
    Device,
    /// Fallback home location from configuration.
    Configured,
}

/// A resolved observer location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub point: GeoPoint,
    pub source: LocationSource,
    pub acquired_at: Timestamp,
}

// =============================================================================
// Ingestion Status
// =============================================================================

/// State of the persistent-connection listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Which ingestion strategies are still live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Poller and stream listener both running.
    Redundant,
    /// Stream listener gave up (or is disabled); poller only.
    PollerOnly,
}
