//! Geographic primitives and spherical math.
//!
//! Provides the coordinate and bounding-box types used across the pipeline
//! plus the great-circle calculations (distance, forward azimuth, circular
//! bearing difference) that the metrics engine and the fragment resolver are
//! built on. All functions here are pure.

mod types;

pub use types::{BoundingBox, Coordinate, GeoError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in kilometers, used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (haversine).
///
/// Accounts for the Earth's curvature; a flat-plane distance drifts badly
/// over the tens-of-kilometers spans this pipeline measures.
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Total distance along a coordinate sequence in kilometers.
///
/// Sums consecutive great-circle distances; accumulation is order-dependent.
/// Returns 0.0 for fewer than two points.
pub fn path_distance_km(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(&pair[0], &pair[1]))
        .sum()
}

/// Forward azimuth from `a` to `b` in degrees, [0, 360).
///
/// 0° = north, 90° = east, 180° = south, 270° = west. Uses spherical
/// geometry, not a flat-earth approximation.
pub fn bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = x.atan2(y).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Smallest circular difference between two bearings, [0, 180].
///
/// Handles wraparound at north: 350° vs 10° is 20°, not 340°.
pub fn angle_difference_deg(bearing1: f64, bearing2: f64) -> f64 {
    let diff = (bearing2 - bearing1).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}
