//! Site amplification from a site-stiffness proxy (Vs30).

use serde::{Deserialize, Serialize};

pub const MIN_SITE_AMPLIFICATION: f64 = 0.7;
pub const MAX_SITE_AMPLIFICATION: f64 = 2.5;

/// NEHRP-style site class, stiffest (A) to softest (E).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteClass {
    /// Hard rock, Vs30 > 1500 m/s.
    A,
    /// Rock, 760 < Vs30 <= 1500.
    B,
    /// Very dense soil / soft rock, 360 < Vs30 <= 760.
    C,
    /// Stiff soil, 180 < Vs30 <= 360.
    D,
    /// Soft soil, Vs30 <= 180.
    E,
}

impl SiteClass {
    pub fn from_vs30(vs30: f64) -> SiteClass {
        if vs30 > 1500.0 {
            SiteClass::A
        } else if vs30 > 760.0 {
            SiteClass::B
        } else if vs30 > 360.0 {
            SiteClass::C
        } else if vs30 > 180.0 {
            SiteClass::D
        } else {
            SiteClass::E
        }
    }

    /// `(base multiplier, change per magnitude unit above M5)`.
    ///
    /// Soft soils respond non-linearly to strong shaking, so their
    /// amplification drops as magnitude grows.
    fn coefficients(&self) -> (f64, f64) {
        match self {
            SiteClass::A => (0.80, 0.0),
            SiteClass::B => (1.00, 0.0),
            SiteClass::C => (1.30, -0.03),
            SiteClass::D => (1.60, -0.08),
            SiteClass::E => (2.00, -0.12),
        }
    }
}

/// Ground-motion multiplier for a site class, magnitude and epicentral distance.
pub fn site_amplification(class: SiteClass, magnitude: f64, epicentral_km: f64) -> f64 {
    let (base, slope) = class.coefficients();
    let mut amp = base + slope * (magnitude - 5.0).max(0.0);

    if epicentral_km < 20.0 {
        amp *= 1.1;
    } else if epicentral_km < 50.0 {
        amp *= 1.05;
    }
    amp.clamp(MIN_SITE_AMPLIFICATION, MAX_SITE_AMPLIFICATION)
}
