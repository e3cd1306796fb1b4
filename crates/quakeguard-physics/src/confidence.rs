//! Confidence scoring for a wave calculation.

use std::fmt;

use quakeguard_core::types::LocationSource;
use serde::{Deserialize, Serialize};

pub const MIN_CONFIDENCE: f64 = 50.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Coarse quality bucket derived from the confidence score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl CalculationQuality {
    pub fn from_confidence(confidence: f64) -> CalculationQuality {
        if confidence >= 90.0 {
            CalculationQuality::Excellent
        } else if confidence >= 75.0 {
            CalculationQuality::Good
        } else if confidence >= 60.0 {
            CalculationQuality::Fair
        } else {
            CalculationQuality::Poor
        }
    }
}

impl fmt::Display for CalculationQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationQuality::Poor => write!(f, "poor"),
            CalculationQuality::Fair => write!(f, "fair"),
            CalculationQuality::Good => write!(f, "good"),
            CalculationQuality::Excellent => write!(f, "excellent"),
        }
    }
}

/// Inputs that move the confidence score.
#[derive(Clone, Copy, Debug)]
pub struct ConfidenceFactors {
    pub epicentral_km: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub location_source: LocationSource,
    pub vs30_known: bool,
    pub station_count: Option<u32>,
}

/// Score in `[50, 100]`: 100 minus penalties plus bonuses.
pub fn score(factors: &ConfidenceFactors) -> f64 {
    let mut confidence = MAX_CONFIDENCE;

    // Near-source geometry is where the point-source model is weakest.
    if factors.epicentral_km < 10.0 {
        confidence -= 15.0;
    }
    if factors.depth_km > 30.0 {
        confidence -= 10.0;
    }
    if factors.magnitude < 4.0 {
        confidence -= 15.0;
    }
    if factors.location_source == LocationSource::Configured {
        confidence -= 20.0;
    }

    if factors.vs30_known {
        confidence += 5.0;
    }
    if factors.station_count.is_some_and(|n| n >= 3) {
        confidence += 5.0;
    }

    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
