//! Geodesy helpers: great-circle and hypocentral distance, distance to a
//! fault trace.

use quakeguard_core::types::GeoPoint;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle surface distance between two points (haversine), in km.
pub fn epicentral_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Straight-line distance from the observer to the rupture at `depth_km`.
pub fn hypocentral_distance_km(epicentral_km: f64, depth_km: f64) -> f64 {
    (epicentral_km * epicentral_km + depth_km * depth_km).sqrt()
}

/// Shortest distance in km from `point` to a polyline of vertices.
///
/// Uses a local equirectangular projection centred on `point`, which is
/// accurate to well under a kilometre at fault-zone scales (< 200 km).
pub fn distance_to_polyline_km(point: GeoPoint, vertices: &[GeoPoint]) -> f64 {
    if vertices.is_empty() {
        return f64::INFINITY;
    }
    let km_per_deg = EARTH_RADIUS_KM.to_radians();
    let cos_lat = point.lat.to_radians().cos();
    let project = |p: GeoPoint| -> (f64, f64) {
        (
            (p.lon - point.lon) * km_per_deg * cos_lat,
            (p.lat - point.lat) * km_per_deg,
        )
    };

    if vertices.len() == 1 {
        let (x, y) = project(vertices[0]);
        return (x * x + y * y).sqrt();
    }

    vertices
        .windows(2)
        .map(|seg| {
            let (ax, ay) = project(seg[0]);
            let (bx, by) = project(seg[1]);
            let (dx, dy) = (bx - ax, by - ay);
            let len_sq = dx * dx + dy * dy;
            let t = if len_sq > 0.0 {
                (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let (cx, cy) = (ax + t * dx, ay + t * dy);
            (cx * cx + cy * cy).sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}
