//! The wave physics engine: one event, one observer, one result.

use quakeguard_core::types::{
    GeoPoint, LocationSource, NormalizedEvent, Timestamp, DEPTH_RANGE_KM, MAGNITUDE_RANGE,
};
use serde::{Deserialize, Serialize};

use crate::attenuation;
use crate::confidence::{self, CalculationQuality, ConfidenceFactors};
use crate::geo;
use crate::intensity;
use crate::region::SeismicRegion;
use crate::site::{self, SiteClass};
use crate::uncertainty;

/// Source parameters of an event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeismicInput {
    pub epicenter: GeoPoint,
    pub depth_km: f64,
    pub magnitude: f64,
    pub origin_time: Timestamp,
    pub station_count: Option<u32>,
}

impl From<&NormalizedEvent> for SeismicInput {
    fn from(event: &NormalizedEvent) -> Self {
        Self {
            epicenter: event.epicenter,
            depth_km: event.depth_km,
            magnitude: event.magnitude,
            origin_time: event.origin_time,
            station_count: event.station_count,
        }
    }
}

/// Where the shaking is being estimated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverSite {
    pub location: GeoPoint,
    pub source: LocationSource,
    /// Time-averaged shear-wave velocity of the top 30 m, m/s.
    pub vs30: Option<f64>,
}

impl ObserverSite {
    pub fn device(location: GeoPoint) -> Self {
        Self {
            location,
            source: LocationSource::Device,
            vs30: None,
        }
    }

    pub fn with_vs30(mut self, vs30: f64) -> Self {
        self.vs30 = Some(vs30);
        self
    }
}

/// Closed interval `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// `value ± spread`, with the lower end floored at zero.
    fn around(value: f64, spread: f64) -> Self {
        Self {
            min: (value - spread).max(0.0),
            max: value + spread,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveCalculationResult {
    pub region: SeismicRegion,
    pub site_class: SiteClass,

    pub epicentral_distance_km: f64,
    pub hypocentral_distance_km: f64,
    pub p_velocity_km_s: f64,
    pub s_velocity_km_s: f64,

    pub p_arrival_secs: f64,
    pub p_arrival_bounds: Bounds,
    pub s_arrival_secs: f64,
    pub s_arrival_bounds: Bounds,

    /// `max(0, s - p)`.
    pub warning_time_secs: f64,
    pub warning_time_bounds: Bounds,
    pub warning_time_uncertainty_secs: f64,

    /// Modified Mercalli Intensity, 1..=12.
    pub estimated_intensity: f64,
    pub intensity_uncertainty: f64,
    /// Peak ground acceleration, g.
    pub estimated_pga_g: f64,
    pub pga_uncertainty_g: f64,
    /// Peak ground velocity, cm/s.
    pub estimated_pgv_cm_s: f64,
    pub site_amplification: f64,

    pub confidence: f64,
    pub quality: CalculationQuality,
}

impl WaveCalculationResult {
    pub fn warning_lower_bound(&self) -> f64 {
        self.warning_time_bounds.min
    }

    pub fn intensity_lower_bound(&self) -> f64 {
        (self.estimated_intensity - self.intensity_uncertainty).max(intensity::MIN_MMI)
    }

    /// Seconds of lead time left before the S-wave reaches the observer,
    /// given the event's origin time and the current wall clock. Zero once
    /// the wave has arrived.
    pub fn seconds_until_s_wave(&self, origin_time: Timestamp, now: Timestamp) -> f64 {
        let elapsed = origin_time.age_ms(now) as f64 / 1000.0;
        (self.s_arrival_secs - elapsed).max(0.0)
    }

    /// Every field is finite and inside its documented range.
    pub fn is_physically_plausible(&self) -> bool {
        let finite = [
            self.epicentral_distance_km,
            self.hypocentral_distance_km,
            self.p_arrival_secs,
            self.s_arrival_secs,
            self.warning_time_secs,
            self.estimated_intensity,
            self.estimated_pga_g,
        ]
        .iter()
        .all(|v| v.is_finite());

        finite
            && self.s_arrival_secs >= self.p_arrival_secs
            && (attenuation::MIN_PGA_G..=attenuation::MAX_PGA_G).contains(&self.estimated_pga_g)
            && (intensity::MIN_MMI..=intensity::MAX_MMI).contains(&self.estimated_intensity)
    }
}

/// Stateless calculator. Cheap to construct and share.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaveEngine;

impl WaveEngine {
    pub fn new() -> Self {
        Self
    }

    /// Estimate arrivals and shaking at `observer` for the event `input`.
    ///
    /// Returns `None` when any input is non-finite or out of range.
    pub fn calculate(
        &self,
        input: &SeismicInput,
        observer: &ObserverSite,
    ) -> Option<WaveCalculationResult> {
        if !validate(input, observer) {
            return None;
        }

        let epicentral_km = geo::epicentral_distance_km(input.epicenter, observer.location);
        let hypocentral_km = geo::hypocentral_distance_km(epicentral_km, input.depth_km);

        let region = SeismicRegion::classify(input.epicenter);
        let (vp, vs) = region.velocity_model().at_depth(input.depth_km);

        let p_arrival = hypocentral_km / vp;
        let s_arrival = hypocentral_km / vs;
        let warning = (s_arrival - p_arrival).max(0.0);

        let depth_unc = region.depth_uncertainty_km();
        let p_unc = uncertainty::arrival_uncertainty(
            p_arrival,
            vp,
            input.depth_km,
            hypocentral_km,
            depth_unc,
            input.magnitude,
        );
        let s_unc = uncertainty::arrival_uncertainty(
            s_arrival,
            vs,
            input.depth_km,
            hypocentral_km,
            depth_unc,
            input.magnitude,
        );
        let warning_unc = uncertainty::interval_uncertainty(p_unc, s_unc);

        let site_class = observer
            .vs30
            .map(SiteClass::from_vs30)
            .unwrap_or_else(|| region.default_site_class());
        let site_amp = site::site_amplification(site_class, input.magnitude, epicentral_km);

        let pga = attenuation::estimate_pga(
            input.magnitude,
            input.depth_km,
            epicentral_km,
            hypocentral_km,
            site_amp,
        );
        let mmi = intensity::mmi_from_pga(pga);
        let pgv = attenuation::estimate_pgv(pga, input.magnitude);

        let confidence = confidence::score(&ConfidenceFactors {
            epicentral_km,
            depth_km: input.depth_km,
            magnitude: input.magnitude,
            location_source: observer.source,
            vs30_known: observer.vs30.is_some(),
            station_count: input.station_count,
        });

        Some(WaveCalculationResult {
            region,
            site_class,
            epicentral_distance_km: epicentral_km,
            hypocentral_distance_km: hypocentral_km,
            p_velocity_km_s: vp,
            s_velocity_km_s: vs,
            p_arrival_secs: p_arrival,
            p_arrival_bounds: Bounds::around(p_arrival, p_unc),
            s_arrival_secs: s_arrival,
            s_arrival_bounds: Bounds::around(s_arrival, s_unc),
            warning_time_secs: warning,
            warning_time_bounds: Bounds::around(warning, warning_unc),
            warning_time_uncertainty_secs: warning_unc,
            estimated_intensity: mmi,
            intensity_uncertainty: intensity::mmi_uncertainty(mmi),
            estimated_pga_g: pga,
            pga_uncertainty_g: attenuation::pga_uncertainty(pga),
            estimated_pgv_cm_s: pgv,
            site_amplification: site_amp,
            confidence,
            quality: CalculationQuality::from_confidence(confidence),
        })
    }
}

fn validate(input: &SeismicInput, observer: &ObserverSite) -> bool {
    let (min_mag, max_mag) = MAGNITUDE_RANGE;
    let (min_depth, max_depth) = DEPTH_RANGE_KM;

    input.epicenter.is_valid()
        && observer.location.is_valid()
        && input.magnitude.is_finite()
        && (min_mag..=max_mag).contains(&input.magnitude)
        && input.depth_km.is_finite()
        && (min_depth..=max_depth).contains(&input.depth_km)
        && observer.vs30.map_or(true, |v| v.is_finite() && v > 0.0)
}
