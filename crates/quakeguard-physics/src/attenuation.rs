//! Ground-motion attenuation: peak ground acceleration and velocity.
//!
//! Two independent relations are blended so neither one's regional bias
//! dominates. All accelerations are in g unless noted.

pub const MIN_PGA_G: f64 = 0.001;
pub const MAX_PGA_G: f64 = 2.0;
pub const MIN_PGV_CM_S: f64 = 0.1;
pub const MAX_PGV_CM_S: f64 = 200.0;

const STANDARD_GRAVITY_CM_S2: f64 = 980.665;
const PRIMARY_WEIGHT: f64 = 0.6;
const SECONDARY_WEIGHT: f64 = 0.4;

/// Campbell-style relation with magnitude-dependent near-source saturation.
///
/// `ln A = -3.512 + 0.904 M - 1.328 ln sqrt(R^2 + (0.149 e^(0.647 M))^2)`
pub fn pga_saturating(magnitude: f64, hypocentral_km: f64) -> f64 {
    let saturation = 0.149 * (0.647 * magnitude).exp();
    let r = (hypocentral_km * hypocentral_km + saturation * saturation).sqrt();
    (-3.512 + 0.904 * magnitude - 1.328 * r.ln()).exp()
}

/// Si-Midorikawa-style relation with anelastic decay and a depth term.
///
/// `log10 A[cm/s^2] = 0.5 M + 0.0043 D - log10(X + 0.0055 * 10^(0.5 M)) - 0.003 X + 0.61`
pub fn pga_anelastic(magnitude: f64, depth_km: f64, hypocentral_km: f64) -> f64 {
    let near = 0.0055 * 10f64.powf(0.5 * magnitude);
    let log_a = 0.5 * magnitude + 0.0043 * depth_km
        - (hypocentral_km + near).log10()
        - 0.003 * hypocentral_km
        + 0.61;
    10f64.powf(log_a) / STANDARD_GRAVITY_CM_S2
}

/// Upper bound applied close to the source, where both relations are poorly
/// constrained and tend to overshoot.
fn near_field_cap(magnitude: f64, epicentral_km: f64) -> f64 {
    if epicentral_km < 10.0 {
        (0.15 * magnitude - 0.25).clamp(0.05, 1.5)
    } else if epicentral_km < 50.0 {
        (0.12 * magnitude - 0.3).clamp(0.02, 1.2)
    } else {
        MAX_PGA_G
    }
}

/// Blended, site-amplified, capped PGA in g, clamped to `[0.001, 2.0]`.
pub fn estimate_pga(
    magnitude: f64,
    depth_km: f64,
    epicentral_km: f64,
    hypocentral_km: f64,
    site_amplification: f64,
) -> f64 {
    let blended = PRIMARY_WEIGHT * pga_saturating(magnitude, hypocentral_km)
        + SECONDARY_WEIGHT * pga_anelastic(magnitude, depth_km, hypocentral_km);
    let amplified = blended * site_amplification;
    let capped = amplified.min(near_field_cap(magnitude, epicentral_km));
    if capped.is_finite() {
        capped.clamp(MIN_PGA_G, MAX_PGA_G)
    } else {
        MIN_PGA_G
    }
}

/// One-sigma PGA uncertainty: 30 % of the estimate, growing to 40 % at 1 g.
pub fn pga_uncertainty(pga: f64) -> f64 {
    pga * (0.30 + 0.10 * pga.min(1.0))
}

/// PGV in cm/s from PGA, scaled by a magnitude-dependent predominant period.
pub fn estimate_pgv(pga_g: f64, magnitude: f64) -> f64 {
    let period_factor = (0.04 + 0.012 * (magnitude - 4.0)).clamp(0.02, 0.12);
    (pga_g * STANDARD_GRAVITY_CM_S2 * period_factor).clamp(MIN_PGV_CM_S, MAX_PGV_CM_S)
}
