//! Quality gate for acquired geometry.
//!
//! Every candidate polyline passes through here before it may back an
//! output record. Checks: point density against the route's measured
//! length, geographic bounds compliance (one offending point rejects the
//! whole candidate, since dropping points would corrupt route order), and a
//! sanity comparison against an externally known road length, which catches
//! silent multi-country concatenation.

use serde::{Deserialize, Serialize};

use crate::geo::{path_distance_km, BoundingBox, Coordinate};

/// Density below this abandons the road entirely.
pub const HARD_MIN_DENSITY: f64 = 1.0;

/// Density below this (but above the hard floor) escalates to the next
/// acquisition tier.
pub const PASS_MIN_DENSITY: f64 = 2.0;

/// Allowed relative deviation from the expected distance.
pub const DEFAULT_DISTANCE_TOLERANCE: f64 = 0.20;

/// Minimum usable point count for a full road.
pub const DEFAULT_MIN_POINTS: usize = 100;

/// Outcome of validating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Candidate accepted.
    Pass,
    /// Candidate unusable, but another acquisition tier may still recover
    /// the road.
    SoftFail,
    /// Geometry critically sparse; further tiers are pointless for this
    /// road.
    HardFail,
}

impl Verdict {
    /// Whether the candidate was accepted.
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::SoftFail => "soft_fail",
            Verdict::HardFail => "hard_fail",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validator thresholds.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Density floor below which the road is abandoned.
    pub hard_min_density: f64,
    /// Density required for acceptance.
    pub pass_min_density: f64,
    /// Allowed relative distance deviation when an expected distance is
    /// known.
    pub distance_tolerance: f64,
    /// Minimum point count for acceptance.
    pub min_points: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            hard_min_density: HARD_MIN_DENSITY,
            pass_min_density: PASS_MIN_DENSITY,
            distance_tolerance: DEFAULT_DISTANCE_TOLERANCE,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

impl ValidatorConfig {
    /// Set the minimum point count.
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Set the allowed relative distance deviation.
    pub fn with_distance_tolerance(mut self, tolerance: f64) -> Self {
        self.distance_tolerance = tolerance;
        self
    }
}

/// Measured quality of one candidate, plus the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Number of route points.
    pub point_count: usize,
    /// Measured route length in kilometers.
    pub distance_km: f64,
    /// Points per kilometer.
    pub density: f64,
    /// Points outside the target bounds.
    pub bounds_violations: usize,
    /// Relative deviation from the expected distance, when one was given.
    pub distance_error_pct: Option<f64>,
    /// The gate decision.
    pub verdict: Verdict,
}

/// The quality gate.
#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    config: ValidatorConfig,
}

impl QualityValidator {
    /// Create a validator with the given thresholds.
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// The active thresholds.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a candidate polyline against the road's bounds and, when
    /// known, its expected length.
    pub fn validate(
        &self,
        points: &[Coordinate],
        bbox: &BoundingBox,
        expected_distance_km: Option<f64>,
    ) -> QualityReport {
        let point_count = points.len();
        let distance_km = path_distance_km(points);
        let density = if distance_km > 0.0 {
            point_count as f64 / distance_km
        } else {
            0.0
        };

        let mut bounds_violations = 0;
        for (index, point) in points.iter().enumerate() {
            if !bbox.contains(point) {
                // A handful of examples is enough for diagnosis; the count
                // still covers every offender.
                if bounds_violations < 5 {
                    tracing::warn!(index, point = %point, "route point outside target bounds");
                }
                bounds_violations += 1;
            }
        }

        let distance_error_pct = expected_distance_km.map(|expected| {
            if expected > 0.0 {
                (distance_km - expected).abs() / expected
            } else {
                0.0
            }
        });

        let verdict = if density < self.config.hard_min_density {
            Verdict::HardFail
        } else if bounds_violations > 0
            || density < self.config.pass_min_density
            || point_count < self.config.min_points
            || distance_error_pct
                .map(|err| err > self.config.distance_tolerance)
                .unwrap_or(false)
        {
            Verdict::SoftFail
        } else {
            Verdict::Pass
        };

        tracing::debug!(
            point_count,
            distance_km = format!("{:.2}", distance_km),
            density = format!("{:.2}", density),
            bounds_violations,
            verdict = verdict.as_str(),
            "validated candidate geometry"
        );

        QualityReport {
            point_count,
            distance_km,
            density,
            bounds_violations,
            distance_error_pct,
            verdict,
        }
    }
}
