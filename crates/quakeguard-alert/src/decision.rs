//! Alert decision filter.
//!
//! Turns an event plus its wave estimate into either a composed
//! [`AlertRequest`] or a [`SuppressReason`]. Gates run in a fixed order and
//! the first failing one wins. All wording and urgency is derived from the
//! lower bounds of warning time and intensity, never the point estimates.

use std::fmt;
use std::sync::Arc;

use quakeguard_core::clock::Clock;
use quakeguard_core::config::AlertConfig;
use quakeguard_core::types::{
    AlertChannel, AlertPriority, AlertRequest, Certainty, ChannelSet, NormalizedEvent,
    MAGNITUDE_RANGE,
};
use quakeguard_physics::intensity;
use quakeguard_physics::{CalculationQuality, WaveCalculationResult};
use serde::{Deserialize, Serialize};

/// Below this magnitude a low-certainty report is not trusted.
pub const LOW_CERTAINTY_MIN_MAGNITUDE: f64 = 4.0;
/// At or above this magnitude every alert is imminent.
pub const FORCE_IMMINENT_MAGNITUDE: f64 = 6.0;
/// Lower intensity bound that promotes advisory and warning tiers to urgent.
pub const PROMOTE_TO_URGENT_MMI: f64 = 7.0;

pub const HIGH_PRECISION_SUFFIX: &str = "[high-precision estimate]";

/// Why an event did not produce an alert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SuppressReason {
    FeatureDisabled,
    NotificationsDisabled,
    BelowMinimumMagnitude { magnitude: f64, minimum: f64 },
    LowCertainty { magnitude: f64 },
    TooOld { age_secs: i64, max_age_secs: u64 },
    Implausible { detail: String },
    NoChannelsEnabled,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::FeatureDisabled => write!(f, "alerts disabled"),
            SuppressReason::NotificationsDisabled => write!(f, "notifications disabled"),
            SuppressReason::BelowMinimumMagnitude { magnitude, minimum } => {
                write!(f, "magnitude {:.1} below minimum {:.1}", magnitude, minimum)
            }
            SuppressReason::LowCertainty { magnitude } => {
                write!(f, "low certainty report of magnitude {:.1}", magnitude)
            }
            SuppressReason::TooOld {
                age_secs,
                max_age_secs,
            } => write!(f, "event is {} s old (max {} s)", age_secs, max_age_secs),
            SuppressReason::Implausible { detail } => write!(f, "implausible: {}", detail),
            SuppressReason::NoChannelsEnabled => write!(f, "no enabled channels"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Alert(AlertRequest),
    Suppressed(SuppressReason),
}

impl Decision {
    pub fn is_alert(&self) -> bool {
        matches!(self, Decision::Alert(_))
    }
}

/// How soon shaking arrives, from least to most urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Advisory,
    Warning,
    Urgent,
    Imminent,
}

impl UrgencyTier {
    /// Tier from the lower bound of warning time alone.
    pub fn from_warning_secs(lower_bound_secs: f64) -> UrgencyTier {
        if lower_bound_secs < 5.0 {
            UrgencyTier::Imminent
        } else if lower_bound_secs < 15.0 {
            UrgencyTier::Urgent
        } else if lower_bound_secs < 30.0 {
            UrgencyTier::Warning
        } else {
            UrgencyTier::Advisory
        }
    }

    /// Full classification including the magnitude and intensity overrides.
    pub fn classify(magnitude: f64, wave: &WaveCalculationResult) -> UrgencyTier {
        let tier = UrgencyTier::from_warning_secs(wave.warning_lower_bound());
        if magnitude >= FORCE_IMMINENT_MAGNITUDE {
            UrgencyTier::Imminent
        } else if wave.intensity_lower_bound() >= PROMOTE_TO_URGENT_MMI
            && tier <= UrgencyTier::Warning
        {
            UrgencyTier::Urgent
        } else {
            tier
        }
    }

    pub fn priority(&self) -> AlertPriority {
        match self {
            UrgencyTier::Imminent => AlertPriority::Critical,
            UrgencyTier::Urgent => AlertPriority::High,
            UrgencyTier::Warning => AlertPriority::Normal,
            UrgencyTier::Advisory => AlertPriority::Low,
        }
    }

    /// Session length. Imminent alerts persist until dismissed.
    pub fn duration_secs(&self) -> u64 {
        match self {
            UrgencyTier::Imminent => 0,
            UrgencyTier::Urgent => 120,
            UrgencyTier::Warning => 60,
            UrgencyTier::Advisory => 30,
        }
    }

    /// On/off durations in milliseconds.
    pub fn vibration_pattern(&self) -> &'static [u64] {
        match self {
            UrgencyTier::Imminent => &[1000, 200, 1000, 200, 1000, 600],
            UrgencyTier::Urgent => &[600, 300, 600, 900],
            UrgencyTier::Warning => &[400, 600],
            UrgencyTier::Advisory => &[200, 1800],
        }
    }

    pub fn sound(&self) -> Option<&'static str> {
        match self {
            UrgencyTier::Imminent => Some("eew_siren"),
            UrgencyTier::Urgent => Some("eew_alarm"),
            UrgencyTier::Warning => Some("eew_chime"),
            UrgencyTier::Advisory => None,
        }
    }

    /// Channels the tier asks for before user preferences are applied.
    pub fn channels(&self) -> ChannelSet {
        use AlertChannel::*;
        match self {
            UrgencyTier::Imminent => ChannelSet::all(),
            UrgencyTier::Urgent => {
                ChannelSet::of(&[Push, FullScreen, AlarmSound, Vibration, Led, Tts])
            }
            UrgencyTier::Warning => ChannelSet::of(&[Push, AlarmSound, Vibration]),
            UrgencyTier::Advisory => ChannelSet::of(&[Push]),
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyTier::Advisory => write!(f, "advisory"),
            UrgencyTier::Warning => write!(f, "warning"),
            UrgencyTier::Urgent => write!(f, "urgent"),
            UrgencyTier::Imminent => write!(f, "imminent"),
        }
    }
}

pub struct DecisionFilter {
    config: AlertConfig,
    clock: Arc<dyn Clock>,
}

impl DecisionFilter {
    pub fn new(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        event: &NormalizedEvent,
        certainty: Certainty,
        wave: Option<&WaveCalculationResult>,
    ) -> Decision {
        match self.check(event, certainty, wave) {
            Ok(wave) => self.compose(event, wave),
            Err(reason) => Decision::Suppressed(reason),
        }
    }

    fn check<'a>(
        &self,
        event: &NormalizedEvent,
        certainty: Certainty,
        wave: Option<&'a WaveCalculationResult>,
    ) -> Result<&'a WaveCalculationResult, SuppressReason> {
        if !self.config.enabled {
            return Err(SuppressReason::FeatureDisabled);
        }
        if !self.config.notifications_enabled {
            return Err(SuppressReason::NotificationsDisabled);
        }
        if event.magnitude.is_nan() || event.magnitude < self.config.min_magnitude {
            return Err(SuppressReason::BelowMinimumMagnitude {
                magnitude: event.magnitude,
                minimum: self.config.min_magnitude,
            });
        }
        if certainty == Certainty::Low && event.magnitude < LOW_CERTAINTY_MIN_MAGNITUDE {
            return Err(SuppressReason::LowCertainty {
                magnitude: event.magnitude,
            });
        }

        let age_ms = event.origin_time.age_ms(self.clock.now());
        let max_age_ms = i64::try_from(self.config.max_event_age_secs.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        if age_ms > max_age_ms {
            return Err(SuppressReason::TooOld {
                age_secs: age_ms / 1000,
                max_age_secs: self.config.max_event_age_secs,
            });
        }

        let (min_mag, max_mag) = MAGNITUDE_RANGE;
        if !(min_mag..=max_mag).contains(&event.magnitude) {
            return Err(implausible("magnitude out of range"));
        }
        if !event.epicenter.is_valid() {
            return Err(implausible("epicenter coordinates out of range"));
        }
        let wave = wave.ok_or_else(|| implausible("no wave estimate"))?;
        if !wave.is_physically_plausible() {
            return Err(implausible("wave estimate outside physical bounds"));
        }
        Ok(wave)
    }

    fn compose(&self, event: &NormalizedEvent, wave: &WaveCalculationResult) -> Decision {
        let tier = UrgencyTier::classify(event.magnitude, wave);
        let channels = tier.channels().intersect(&self.config.channels);
        if channels.is_empty() {
            return Decision::Suppressed(SuppressReason::NoChannelsEnabled);
        }

        let lead_secs = wave.warning_lower_bound().floor() as u64;
        let intensity_min = wave.intensity_lower_bound();
        let place = if event.region.trim().is_empty() {
            "unknown location"
        } else {
            event.region.as_str()
        };

        let title = match tier {
            UrgencyTier::Imminent => "EARTHQUAKE! Drop, cover and hold on".to_string(),
            UrgencyTier::Urgent => format!("Earthquake: strong shaking in {} s", lead_secs),
            UrgencyTier::Warning => format!("Earthquake warning: shaking in {} s", lead_secs),
            UrgencyTier::Advisory => format!("Earthquake advisory: M{:.1}", event.magnitude),
        };

        let lead = if lead_secs == 0 {
            "Shaking is imminent".to_string()
        } else {
            format!("Shaking in at least {} s", lead_secs)
        };
        let mut body = format!(
            "M{:.1} {}, {:.0} km away. {}, intensity {} or stronger.",
            event.magnitude,
            place,
            wave.epicentral_distance_km,
            lead,
            intensity::roman(intensity_min),
        );
        if wave.quality == CalculationQuality::Excellent {
            body.push(' ');
            body.push_str(HIGH_PRECISION_SUFFIX);
        }

        let speech = match tier {
            UrgencyTier::Imminent | UrgencyTier::Urgent => {
                "Earthquake! Take cover now.".to_string()
            }
            _ => format!(
                "Earthquake alert. Magnitude {:.1}. Shaking expected in {} seconds.",
                event.magnitude, lead_secs
            ),
        };

        let mut request = AlertRequest::new(title, body, tier.priority(), channels);
        request.duration_secs = tier.duration_secs();
        request.vibration_pattern = Some(tier.vibration_pattern().to_vec());
        request.custom_sound = tier.sound().map(str::to_string);
        request.speech_text = Some(speech);
        request.payload = serde_json::json!({
            "event_id": event.id,
            "source": event.source,
            "magnitude": event.magnitude,
            "region": place,
            "tier": tier,
            "warning_secs_min": wave.warning_lower_bound(),
            "intensity_min": intensity_min,
            "quality": wave.quality,
        });
        Decision::Alert(request)
    }
}

fn implausible(detail: &str) -> SuppressReason {
    SuppressReason::Implausible {
        detail: detail.to_string(),
    }
}
