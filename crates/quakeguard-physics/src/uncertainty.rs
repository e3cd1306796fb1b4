//! Arrival-time uncertainty propagation.

pub const MIN_ARRIVAL_UNCERTAINTY_SECS: f64 = 0.5;
pub const MAX_ARRIVAL_UNCERTAINTY_SECS: f64 = 10.0;

/// Relative error of the regional velocity model.
const VELOCITY_RELATIVE_ERROR: f64 = 0.05;

/// Timing error from epicenter location error, independent of distance.
const LOCATION_TERM_SECS: f64 = 0.8;

fn magnitude_inflation(magnitude: f64) -> f64 {
    if magnitude < 4.0 {
        1.5
    } else if magnitude < 5.0 {
        1.2
    } else {
        1.0
    }
}

/// One-sigma uncertainty of a single phase arrival, in seconds.
///
/// Root-sum-square of the velocity, location and depth terms, inflated for
/// small events (sparser station coverage) and clamped to `[0.5, 10]`.
pub fn arrival_uncertainty(
    arrival_secs: f64,
    velocity_km_s: f64,
    depth_km: f64,
    hypocentral_km: f64,
    depth_uncertainty_km: f64,
    magnitude: f64,
) -> f64 {
    let velocity_term = VELOCITY_RELATIVE_ERROR * arrival_secs;
    // d(hypo)/d(depth) = depth / hypo
    let depth_term = if hypocentral_km > 0.0 {
        depth_uncertainty_km / velocity_km_s * (depth_km / hypocentral_km)
    } else {
        depth_uncertainty_km / velocity_km_s
    };
    let combined = (velocity_term * velocity_term
        + LOCATION_TERM_SECS * LOCATION_TERM_SECS
        + depth_term * depth_term)
        .sqrt();

    (combined * magnitude_inflation(magnitude))
        .clamp(MIN_ARRIVAL_UNCERTAINTY_SECS, MAX_ARRIVAL_UNCERTAINTY_SECS)
}

/// Uncertainty of the S-minus-P interval from the two phase uncertainties.
pub fn interval_uncertainty(p_uncertainty: f64, s_uncertainty: f64) -> f64 {
    (p_uncertainty * p_uncertainty + s_uncertainty * s_uncertainty)
        .sqrt()
        .clamp(MIN_ARRIVAL_UNCERTAINTY_SECS, MAX_ARRIVAL_UNCERTAINTY_SECS)
}
