//! First tier: one direct query against the line-geometry service.

use std::sync::Arc;

use crate::overpass::{build_queries, route_objects, OverpassClient};
use crate::resolve::{resolve, ResolveError, ResolverConfig};
use crate::road::{GeometryCandidate, Provenance, RoadSpec};

use super::{AcquisitionError, AcquisitionStrategy};

/// Tries each candidate query in order and resolves the first usable
/// response.
///
/// Terminal failures on one candidate (no match, malformed response) move
/// on to the next spelling; transient failures surface immediately because
/// the client has already spent its retry budget and the orchestrator
/// should escalate to a cheaper-per-call tier instead of hammering the
/// service.
pub struct DirectQueryStrategy {
    client: Arc<OverpassClient>,
    resolver: ResolverConfig,
}

impl DirectQueryStrategy {
    /// Create the tier over a shared client.
    pub fn new(client: Arc<OverpassClient>, resolver: ResolverConfig) -> Self {
        Self { client, resolver }
    }
}

impl AcquisitionStrategy for DirectQueryStrategy {
    fn name(&self) -> &'static str {
        "direct_query"
    }

    fn acquire(&self, road: &RoadSpec) -> Result<GeometryCandidate, AcquisitionError> {
        let ql_timeout = self.client.timeout().as_secs();
        let queries = build_queries(&road.osm_ref, &road.bbox, ql_timeout);
        if queries.is_empty() {
            return Err(AcquisitionError::NoQueries);
        }

        let mut last_error: Option<AcquisitionError> = None;

        for query in &queries {
            let response = match self.client.fetch(query) {
                Ok(response) => response,
                Err(e) if e.is_transient() => return Err(e.into()),
                Err(e) => {
                    last_error = Some(e.into());
                    continue;
                }
            };

            match resolve(&route_objects(&response), &road.bbox, &self.resolver) {
                Ok(route) => {
                    tracing::info!(
                        road = %road.code,
                        reference = %query.reference,
                        object_kind = route.object_kind.as_str(),
                        points = route.points.len(),
                        fragments = route.merged_fragments,
                        "direct query resolved route"
                    );
                    return Ok(GeometryCandidate::new(
                        route.points,
                        Provenance::DirectQuery,
                        Some(route.object_kind),
                    ));
                }
                Err(e) => {
                    tracing::debug!(
                        road = %road.code,
                        reference = %query.reference,
                        error = %e,
                        "candidate query did not resolve"
                    );
                    // A fragmented result is more diagnostic than the
                    // no-match a later spelling will likely produce.
                    let keep_previous = matches!(
                        last_error,
                        Some(AcquisitionError::Resolve(ResolveError::Fragmented { .. }))
                    ) && !matches!(e, ResolveError::Fragmented { .. });
                    if !keep_previous {
                        last_error = Some(e.into());
                    }
                }
            }
        }

        Err(last_error.unwrap_or(AcquisitionError::Resolve(ResolveError::NoMatch)))
    }
}
