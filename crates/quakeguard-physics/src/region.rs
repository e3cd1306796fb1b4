//! Geological zone classification.
//!
//! Fault zones are matched by distance to a simplified surface trace; the
//! remaining zones are coarse bounding boxes checked in order.

use std::fmt;

use quakeguard_core::types::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::geo::distance_to_polyline_km;
use crate::site::SiteClass;
use crate::velocity::{self, VelocityModel};

/// Named geological zone with its own crustal model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeismicRegion {
    NorthAnatolianFault,
    EastAnatolianFault,
    AegeanExtension,
    CentralAnatolia,
    BlackSeaMargin,
    GlobalAverage,
}

/// Simplified North Anatolian Fault trace, Saros Gulf to Karliova.
const NAF_TRACE: &[GeoPoint] = &[
    GeoPoint { lat: 40.60, lon: 26.20 },
    GeoPoint { lat: 40.75, lon: 27.60 },
    GeoPoint { lat: 40.85, lon: 28.80 },
    GeoPoint { lat: 40.72, lon: 29.90 },
    GeoPoint { lat: 40.75, lon: 31.20 },
    GeoPoint { lat: 40.95, lon: 33.50 },
    GeoPoint { lat: 40.80, lon: 35.50 },
    GeoPoint { lat: 40.30, lon: 37.50 },
    GeoPoint { lat: 39.75, lon: 39.50 },
    GeoPoint { lat: 39.35, lon: 41.00 },
];

/// Simplified East Anatolian Fault trace, Karliova to Antakya.
const EAF_TRACE: &[GeoPoint] = &[
    GeoPoint { lat: 39.35, lon: 41.00 },
    GeoPoint { lat: 38.65, lon: 39.50 },
    GeoPoint { lat: 38.00, lon: 38.00 },
    GeoPoint { lat: 37.30, lon: 36.80 },
    GeoPoint { lat: 36.20, lon: 36.15 },
];

const NAF_ZONE_HALF_WIDTH_KM: f64 = 60.0;
const EAF_ZONE_HALF_WIDTH_KM: f64 = 50.0;

impl SeismicRegion {
    pub const ALL: [SeismicRegion; 6] = [
        SeismicRegion::NorthAnatolianFault,
        SeismicRegion::EastAnatolianFault,
        SeismicRegion::AegeanExtension,
        SeismicRegion::CentralAnatolia,
        SeismicRegion::BlackSeaMargin,
        SeismicRegion::GlobalAverage,
    ];

    /// Classify an epicenter. Fault zones take precedence over boxes.
    pub fn classify(point: GeoPoint) -> SeismicRegion {
        if distance_to_polyline_km(point, NAF_TRACE) <= NAF_ZONE_HALF_WIDTH_KM {
            return SeismicRegion::NorthAnatolianFault;
        }
        if distance_to_polyline_km(point, EAF_TRACE) <= EAF_ZONE_HALF_WIDTH_KM {
            return SeismicRegion::EastAnatolianFault;
        }

        let (lat, lon) = (point.lat, point.lon);
        if (36.0..=40.0).contains(&lat) && (25.5..30.0).contains(&lon) {
            SeismicRegion::AegeanExtension
        } else if (41.0..=43.5).contains(&lat) && (27.5..=42.0).contains(&lon) {
            SeismicRegion::BlackSeaMargin
        } else if (36.5..41.0).contains(&lat) && (30.0..=44.5).contains(&lon) {
            SeismicRegion::CentralAnatolia
        } else {
            SeismicRegion::GlobalAverage
        }
    }

    pub fn velocity_model(&self) -> VelocityModel {
        match self {
            SeismicRegion::NorthAnatolianFault => velocity::NORTH_ANATOLIAN,
            SeismicRegion::EastAnatolianFault => velocity::EAST_ANATOLIAN,
            SeismicRegion::AegeanExtension => velocity::AEGEAN,
            SeismicRegion::CentralAnatolia => velocity::CENTRAL_ANATOLIA,
            SeismicRegion::BlackSeaMargin => velocity::BLACK_SEA,
            SeismicRegion::GlobalAverage => velocity::GLOBAL,
        }
    }

    /// Site class assumed when the observer's Vs30 is unknown.
    pub fn default_site_class(&self) -> SiteClass {
        match self {
            SeismicRegion::AegeanExtension | SeismicRegion::BlackSeaMargin => SiteClass::D,
            _ => SiteClass::C,
        }
    }

    /// One-sigma hypocenter depth uncertainty for catalogue solutions, km.
    pub fn depth_uncertainty_km(&self) -> f64 {
        match self {
            SeismicRegion::NorthAnatolianFault | SeismicRegion::EastAnatolianFault => 4.0,
            SeismicRegion::AegeanExtension | SeismicRegion::CentralAnatolia => 5.0,
            SeismicRegion::BlackSeaMargin => 6.0,
            SeismicRegion::GlobalAverage => 8.0,
        }
    }

    pub fn is_fault_zone(&self) -> bool {
        matches!(
            self,
            SeismicRegion::NorthAnatolianFault | SeismicRegion::EastAnatolianFault
        )
    }
}

impl fmt::Display for SeismicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeismicRegion::NorthAnatolianFault => write!(f, "North Anatolian Fault"),
            SeismicRegion::EastAnatolianFault => write!(f, "East Anatolian Fault"),
            SeismicRegion::AegeanExtension => write!(f, "Aegean Extension"),
            SeismicRegion::CentralAnatolia => write!(f, "Central Anatolia"),
            SeismicRegion::BlackSeaMargin => write!(f, "Black Sea Margin"),
            SeismicRegion::GlobalAverage => write!(f, "Global Average"),
        }
    }
}
