//! RoadScout - road geometry acquisition and motorcycling metrics.
//!
//! Given a road reference, this library produces a single, geographically
//! valid, sufficiently dense polyline plus derived riding metrics
//! (distance, curve counts by severity, straight-section statistics,
//! elevation gain/loss), despite a fragmented upstream line-geometry
//! source and rate-limited elevation and routing services.
//!
//! Acquisition is tiered: cached geometry is reused when fresh; otherwise a
//! direct query runs first, a segmented per-sub-region query handles routes
//! too large for one request, and a curated-waypoint routing fallback
//! covers roads whose upstream geometry is beyond repair. Every candidate
//! passes a quality gate (density, bounds, distance sanity) before it may
//! back an output record.

pub mod cache;
pub mod elevation;
pub mod geo;
pub mod logging;
pub mod metrics;
pub mod net;
pub mod overpass;
pub mod pipeline;
pub mod resolve;
pub mod road;
pub mod routing;
pub mod strategy;
pub mod validate;
