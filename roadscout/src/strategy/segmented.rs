//! Second tier: per-sub-region queries for routes too large to fetch in
//! one request.
//!
//! The target bounding box is cut into contiguous sub-regions along its
//! longer axis and each sub-region is fetched and resolved independently
//! with a reduced timeout. The cuts are geographic, not topological, so
//! adjacent section endpoints land close together and the resolver's chain
//! merge stitches them. A section that fails (including one that is itself
//! fragmented) is skipped and reported; the run only aborts when too few
//! sections survive.

use std::sync::Arc;
use std::time::Duration;

use crate::geo::{BoundingBox, Coordinate};
use crate::overpass::{build_queries, route_objects, OverpassClient};
use crate::resolve::{chain_fragments, resolve, ResolveError, ResolverConfig};
use crate::road::{GeometryCandidate, ObjectKind, Provenance, RoadSpec};

use super::{AcquisitionError, AcquisitionStrategy};

/// Default number of sub-regions.
pub const DEFAULT_SEGMENTS: usize = 4;

/// Default per-section query timeout.
pub const DEFAULT_SEGMENT_TIMEOUT_SECS: u64 = 25;

/// Default minimum fraction of sections that must succeed.
pub const DEFAULT_MIN_SUCCESS_RATIO: f64 = 0.7;

/// Default endpoint tolerance when stitching adjacent sections.
///
/// Wider than the in-object chain tolerance: the section boundary is an
/// arbitrary geographic cut, and the nearest points on either side can sit
/// a few hundred meters apart.
pub const DEFAULT_STITCH_TOLERANCE_KM: f64 = 1.0;

/// Tuning for the segmentation tier.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Number of sub-regions to cut the bounding box into.
    pub segments: usize,
    /// Per-section query timeout.
    pub segment_timeout: Duration,
    /// Minimum fraction of sections that must produce geometry.
    pub min_success_ratio: f64,
    /// Endpoint tolerance when stitching section results.
    pub stitch_tolerance_km: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            segments: DEFAULT_SEGMENTS,
            segment_timeout: Duration::from_secs(DEFAULT_SEGMENT_TIMEOUT_SECS),
            min_success_ratio: DEFAULT_MIN_SUCCESS_RATIO,
            stitch_tolerance_km: DEFAULT_STITCH_TOLERANCE_KM,
        }
    }
}

impl SegmentationConfig {
    /// Set the number of sub-regions.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(2);
        self
    }

    /// Set the per-section timeout.
    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.segment_timeout = timeout;
        self
    }

    /// Set the minimum section success ratio.
    pub fn with_min_success_ratio(mut self, ratio: f64) -> Self {
        self.min_success_ratio = ratio.clamp(0.0, 1.0);
        self
    }
}

/// The segmentation tier.
pub struct SegmentedQueryStrategy {
    client: Arc<OverpassClient>,
    resolver: ResolverConfig,
    config: SegmentationConfig,
}

impl SegmentedQueryStrategy {
    /// Create the tier over a shared client.
    pub fn new(
        client: Arc<OverpassClient>,
        resolver: ResolverConfig,
        config: SegmentationConfig,
    ) -> Self {
        Self {
            client,
            resolver,
            config,
        }
    }

    /// Fetch and resolve one sub-region, trying candidate spellings in
    /// order.
    fn fetch_section(
        &self,
        road: &RoadSpec,
        section_bbox: &BoundingBox,
    ) -> Result<(Vec<Coordinate>, ObjectKind), AcquisitionError> {
        let ql_timeout = self.config.segment_timeout.as_secs();
        let queries = build_queries(&road.osm_ref, section_bbox, ql_timeout);
        if queries.is_empty() {
            return Err(AcquisitionError::NoQueries);
        }

        let mut last_error: Option<AcquisitionError> = None;
        for query in &queries {
            let response = match self
                .client
                .fetch_with_timeout(query, self.config.segment_timeout)
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(e.into());
                    continue;
                }
            };
            match resolve(&route_objects(&response), section_bbox, &self.resolver) {
                Ok(route) => return Ok((route.points, route.object_kind)),
                Err(e) => last_error = Some(e.into()),
            }
        }
        Err(last_error.unwrap_or(AcquisitionError::Resolve(ResolveError::NoMatch)))
    }
}

impl AcquisitionStrategy for SegmentedQueryStrategy {
    fn name(&self) -> &'static str {
        "segmented_query"
    }

    fn acquire(&self, road: &RoadSpec) -> Result<GeometryCandidate, AcquisitionError> {
        let sections = road.bbox.split(self.config.segments);
        let total = sections.len();

        let mut resolved: Vec<Vec<Coordinate>> = Vec::with_capacity(total);
        let mut kinds: Vec<ObjectKind> = Vec::new();
        let mut failed = 0usize;

        for (index, section_bbox) in sections.iter().enumerate() {
            match self.fetch_section(road, section_bbox) {
                Ok((points, kind)) => {
                    tracing::debug!(
                        road = %road.code,
                        section = index + 1,
                        total,
                        points = points.len(),
                        "section resolved"
                    );
                    resolved.push(points);
                    kinds.push(kind);
                }
                Err(e) => {
                    // Skip and report; a partial assembly may still pass
                    // the success-ratio gate.
                    tracing::warn!(
                        road = %road.code,
                        section = index + 1,
                        total,
                        error = %e,
                        "section failed"
                    );
                    failed += 1;
                }
            }
        }

        let succeeded = resolved.len();
        let ratio = succeeded as f64 / total as f64;
        if ratio < self.config.min_success_ratio {
            return Err(AcquisitionError::SegmentShortfall { succeeded, total });
        }

        let chained = chain_fragments(&resolved, self.config.stitch_tolerance_km);
        if chained.pieces > 1 {
            return Err(AcquisitionError::Resolve(ResolveError::Fragmented {
                pieces: chained.pieces,
            }));
        }

        tracing::info!(
            road = %road.code,
            sections = succeeded,
            failed,
            points = chained.points.len(),
            "segmented acquisition assembled route"
        );

        let uniform_kind = kinds
            .first()
            .copied()
            .filter(|first| kinds.iter().all(|k| k == first));

        Ok(GeometryCandidate::new(
            chained.points,
            Provenance::Segmented,
            uniform_kind,
        ))
    }
}
