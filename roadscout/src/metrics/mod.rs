//! Road metrics derived from a validated coordinate sequence.
//!
//! Everything here is pure and side-effect free: distance, curve
//! classification, straight-section statistics, and elevation aggregates.
//! The input is assumed to have passed the quality validator; garbage in
//! still produces numbers, just meaningless ones.
//!
//! Curve detection compares the bearing into each interior point with the
//! bearing out of it. A circular difference at or above the minimum curve
//! angle is a curve event, classified by severity; sub-threshold differences
//! accumulate into straight runs. A curve event closes the current straight
//! run, and the run still open at the final point is closed and counted too.

use serde::{Deserialize, Serialize};

use crate::geo::{angle_difference_deg, bearing_deg, haversine_km, path_distance_km, Coordinate};

/// Bearing change at or above this is a curve event.
pub const MIN_CURVE_ANGLE_DEG: f64 = 20.0;

/// Curve events at or above this count as moderate.
pub const MODERATE_CURVE_ANGLE_DEG: f64 = 45.0;

/// Curve events at or above this count as sharp.
pub const SHARP_CURVE_ANGLE_DEG: f64 = 90.0;

/// All metrics derived for one road.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadMetrics {
    /// Total route length in kilometers.
    pub distance_km: f64,
    /// Total curve events.
    pub curve_count_total: u32,
    /// Curves in [20°, 45°).
    pub curve_count_gentle: u32,
    /// Curves in [45°, 90°).
    pub curve_count_moderate: u32,
    /// Curves in [90°, 180°].
    pub curve_count_sharp: u32,
    /// Closed straight runs.
    pub straight_count: u32,
    /// Length of the longest straight run in kilometers.
    pub longest_straight_km: f64,
    /// Highest elevation sample in meters.
    pub elevation_max: f64,
    /// Lowest elevation sample in meters.
    pub elevation_min: f64,
    /// Cumulative climb in meters (every positive step).
    pub elevation_gain: f64,
    /// Cumulative descent in meters (every negative step, as magnitude).
    pub elevation_loss: f64,
}

/// Compute all metrics for a route and its (possibly empty) elevation
/// samples.
pub fn compute(points: &[Coordinate], elevations: &[f64]) -> RoadMetrics {
    let mut metrics = analyze_route(points);
    let (max, min, gain, loss) = elevation_stats(elevations);
    metrics.elevation_max = max;
    metrics.elevation_min = min;
    metrics.elevation_gain = gain;
    metrics.elevation_loss = loss;
    metrics
}

/// Distance, curve, and straight-section metrics for a route.
pub fn analyze_route(points: &[Coordinate]) -> RoadMetrics {
    let mut metrics = RoadMetrics {
        distance_km: path_distance_km(points),
        ..Default::default()
    };

    if points.len() < 2 {
        return metrics;
    }

    let mut straights: Vec<f64> = Vec::new();
    let mut run_km = 0.0;

    let mut prev_bearing = bearing_deg(&points[0], &points[1]);
    run_km += haversine_km(&points[0], &points[1]);

    for window in points.windows(2).skip(1) {
        let bearing = bearing_deg(&window[0], &window[1]);
        let change = angle_difference_deg(prev_bearing, bearing);

        if change >= MIN_CURVE_ANGLE_DEG {
            metrics.curve_count_total += 1;
            if change < MODERATE_CURVE_ANGLE_DEG {
                metrics.curve_count_gentle += 1;
            } else if change < SHARP_CURVE_ANGLE_DEG {
                metrics.curve_count_moderate += 1;
            } else {
                metrics.curve_count_sharp += 1;
            }

            // The curve closes the current straight run.
            if run_km > 0.0 {
                straights.push(run_km);
            }
            run_km = 0.0;
        }

        run_km += haversine_km(&window[0], &window[1]);
        prev_bearing = bearing;
    }

    // Close the trailing run at the final point.
    if run_km > 0.0 {
        straights.push(run_km);
    }

    metrics.straight_count = straights.len() as u32;
    metrics.longest_straight_km = straights.iter().cloned().fold(0.0, f64::max);
    metrics
}

/// Elevation extrema and cumulative gain/loss.
///
/// Gain and loss are cumulative, not net: every positive step between
/// consecutive samples adds to gain, every negative step adds its magnitude
/// to loss. Net change would understate how much climbing a road actually
/// demands.
pub fn elevation_stats(elevations: &[f64]) -> (f64, f64, f64, f64) {
    if elevations.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let mut max = f64::MIN;
    let mut min = f64::MAX;
    for &e in elevations {
        max = max.max(e);
        min = min.min(e);
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    for pair in elevations.windows(2) {
        let step = pair[1] - pair[0];
        if step > 0.0 {
            gain += step;
        } else {
            loss += -step;
        }
    }

    (max, min, gain, loss)
}
