//! Last tier: synthesize geometry from a curated waypoint skeleton.
//!
//! Used for roads whose upstream geometry is irreparably fragmented. The
//! ordered waypoint list is batched at the routing service's per-request
//! cap, each batch's routed leg passes the quality gate on its own, and the
//! legs are concatenated with duplicated join points dropped.

use std::sync::Arc;

use crate::geo::{haversine_km, Coordinate};
use crate::road::{GeometryCandidate, Provenance, RoadSpec};
use crate::routing::{batch_ranges, DirectionsClient};
use crate::validate::QualityValidator;

use super::{AcquisitionError, AcquisitionStrategy};

/// Join points closer than this are duplicates of the shared batch
/// endpoint.
const JOINT_DUPLICATE_KM: f64 = 0.001;

/// The waypoint-routing tier.
pub struct WaypointRoutingStrategy {
    directions: Arc<DirectionsClient>,
    /// Gate applied per routed leg. Configured with a relaxed point
    /// minimum: a short leg with a handful of dense points is fine, the
    /// full-road minimum applies later to the assembled route.
    leg_validator: QualityValidator,
}

impl WaypointRoutingStrategy {
    /// Create the tier over a shared routing client.
    pub fn new(directions: Arc<DirectionsClient>, leg_validator: QualityValidator) -> Self {
        Self {
            directions,
            leg_validator,
        }
    }
}

impl AcquisitionStrategy for WaypointRoutingStrategy {
    fn name(&self) -> &'static str {
        "waypoint_routing"
    }

    fn acquire(&self, road: &RoadSpec) -> Result<GeometryCandidate, AcquisitionError> {
        if road.waypoints.len() < 2 {
            return Err(AcquisitionError::NoWaypoints);
        }

        let ranges = batch_ranges(
            road.waypoints.len(),
            self.directions.max_waypoints_per_request(),
        );
        tracing::info!(
            road = %road.code,
            waypoints = road.waypoints.len(),
            batches = ranges.len(),
            "routing from waypoint skeleton"
        );

        let mut merged: Vec<Coordinate> = Vec::new();
        for (start, end) in ranges {
            let leg_waypoints = &road.waypoints[start..end];
            let leg_name = format!(
                "{} → {}",
                leg_waypoints[0].name,
                leg_waypoints[leg_waypoints.len() - 1].name
            );

            let points = self.directions.route(leg_waypoints)?;

            // No expected distance per leg: the routed leg length is the
            // routing engine's choice, only density and bounds gate here.
            let report = self.leg_validator.validate(&points, &road.bbox, None);
            if !report.verdict.is_pass() {
                tracing::warn!(
                    road = %road.code,
                    leg = %leg_name,
                    verdict = report.verdict.as_str(),
                    density = format!("{:.2}", report.density),
                    bounds_violations = report.bounds_violations,
                    "routed leg failed validation"
                );
                return Err(AcquisitionError::LegRejected {
                    leg: leg_name,
                    verdict: report.verdict,
                });
            }

            tracing::debug!(
                road = %road.code,
                leg = %leg_name,
                points = points.len(),
                distance_km = format!("{:.2}", report.distance_km),
                "routed leg accepted"
            );

            let skip_joint = match (merged.last(), points.first()) {
                (Some(tail), Some(head)) => haversine_km(tail, head) < JOINT_DUPLICATE_KM,
                _ => false,
            };
            merged.extend(points.into_iter().skip(usize::from(skip_joint)));
        }

        Ok(GeometryCandidate::new(
            merged,
            Provenance::WaypointRouted,
            None,
        ))
    }
}
