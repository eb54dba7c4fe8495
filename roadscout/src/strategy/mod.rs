//! Tiered acquisition strategies.
//!
//! The fallback chain (direct query → segmented query → waypoint routing)
//! is modeled as an explicit ordered list of [`AcquisitionStrategy`]
//! implementations rather than nested error handlers, so each tier's entry
//! and exit conditions are independently testable and the escalation order
//! is data, not control flow.

mod direct;
mod segmented;
mod waypoints;

pub use direct::DirectQueryStrategy;
pub use segmented::{SegmentationConfig, SegmentedQueryStrategy};
pub use waypoints::WaypointRoutingStrategy;

use thiserror::Error;

use crate::net::FetchError;
use crate::resolve::ResolveError;
use crate::road::{GeometryCandidate, RoadSpec};
use crate::routing::RoutingError;
use crate::validate::Verdict;

/// Why one acquisition tier failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The road reference produced no usable queries.
    #[error("road reference produced no candidate queries")]
    NoQueries,

    /// The road has no curated waypoint skeleton.
    #[error("road has no waypoint skeleton")]
    NoWaypoints,

    /// Upstream fetch failed after retries.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// No usable geometry could be resolved from the responses.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The routing service failed.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Too many sub-region fetches failed to assemble a segmented route.
    #[error("only {succeeded} of {total} segments succeeded")]
    SegmentShortfall {
        /// Segments that produced usable geometry.
        succeeded: usize,
        /// Segments attempted.
        total: usize,
    },

    /// A routed leg failed its quality gate.
    #[error("routed leg {leg} failed validation: {verdict}")]
    LegRejected {
        /// Human-readable leg description.
        leg: String,
        /// The failing verdict.
        verdict: Verdict,
    },
}

/// One tier of the acquisition cascade.
pub trait AcquisitionStrategy: Send + Sync {
    /// Short tier name for logs and error reports.
    fn name(&self) -> &'static str;

    /// Attempt to acquire geometry for the road.
    fn acquire(&self, road: &RoadSpec) -> Result<GeometryCandidate, AcquisitionError>;
}
