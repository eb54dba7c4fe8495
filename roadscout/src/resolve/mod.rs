//! Candidate selection and fragment merging.
//!
//! A single upstream query can return several route objects (the same road
//! code legitimately exists in unrelated countries) and each object can be
//! split into disjoint path fragments. Resolution happens in two steps:
//!
//! 1. **Scoring**: every object is scored by how many of its points fall
//!    inside the target bounding box, and the highest-scoring object wins.
//!    Selection is an explicit argmax, never "first match wins".
//! 2. **Chaining**: the winner's fragments are stitched by greedy
//!    endpoint matching within a distance tolerance, reversing a fragment
//!    when its far end is the one that lines up.
//!
//! Fragments that cannot be chained are *not* concatenated in arbitrary
//! order; a disconnected result is reported as [`ResolveError::Fragmented`]
//! so the orchestrator can escalate instead of persisting a route that
//! teleports between gaps.

use thiserror::Error;

use crate::geo::{haversine_km, BoundingBox, Coordinate};
use crate::overpass::RouteObject;
use crate::road::ObjectKind;

/// Default endpoint-matching tolerance for fragment chaining.
pub const DEFAULT_CHAIN_TOLERANCE_KM: f64 = 0.25;

/// Joint points closer than this are duplicates and get dropped on merge.
const JOINT_DUPLICATE_KM: f64 = 0.001;

/// Resolution failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The response contained no route objects at all.
    #[error("response contained no route objects")]
    Empty,

    /// No object had any point inside the target bounds.
    #[error("no route object matched the target bounds")]
    NoMatch,

    /// The best object could not be chained into one polyline.
    #[error("route is fragmented into {pieces} disconnected pieces")]
    Fragmented {
        /// Number of disconnected pieces after chaining.
        pieces: usize,
    },
}

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum endpoint gap that still counts as connected.
    pub chain_tolerance_km: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            chain_tolerance_km: DEFAULT_CHAIN_TOLERANCE_KM,
        }
    }
}

impl ResolverConfig {
    /// Set the endpoint-matching tolerance.
    pub fn with_chain_tolerance_km(mut self, tolerance_km: f64) -> Self {
        self.chain_tolerance_km = tolerance_km;
        self
    }
}

/// A successfully resolved single polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// The chained route points.
    pub points: Vec<Coordinate>,
    /// Upstream object type the route came from.
    pub object_kind: ObjectKind,
    /// How many fragments were merged to produce the polyline.
    pub merged_fragments: usize,
}

/// Result of chaining a fragment set.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainResult {
    /// The longest chain that could be assembled, starting from the first
    /// fragment.
    pub points: Vec<Coordinate>,
    /// Total disconnected pieces: 1 means fully chained.
    pub pieces: usize,
    /// Fragments that went into the chain.
    pub merged_fragments: usize,
}

/// Select and merge the best route object for the target bounds.
pub fn resolve(
    objects: &[RouteObject],
    bbox: &BoundingBox,
    config: &ResolverConfig,
) -> Result<ResolvedRoute, ResolveError> {
    if objects.is_empty() {
        return Err(ResolveError::Empty);
    }

    let (best, score) = objects
        .iter()
        .map(|object| (object, inlier_count(object, bbox)))
        .max_by_key(|(_, score)| *score)
        .expect("objects is non-empty");

    if score == 0 {
        tracing::debug!(
            candidates = objects.len(),
            "no candidate object has points inside the target bounds"
        );
        return Err(ResolveError::NoMatch);
    }

    tracing::debug!(
        candidates = objects.len(),
        winner_id = best.id,
        winner_kind = best.object_kind.as_str(),
        inliers = score,
        fragments = best.fragments.len(),
        "selected route object by bounds score"
    );

    let chained = chain_fragments(&best.fragments, config.chain_tolerance_km);
    if chained.pieces > 1 {
        tracing::warn!(
            winner_id = best.id,
            pieces = chained.pieces,
            "route object is fragmented beyond the chain tolerance"
        );
        return Err(ResolveError::Fragmented {
            pieces: chained.pieces,
        });
    }

    Ok(ResolvedRoute {
        points: chained.points,
        object_kind: best.object_kind,
        merged_fragments: chained.merged_fragments,
    })
}

/// Count the object's points inside the bounding box.
fn inlier_count(object: &RouteObject, bbox: &BoundingBox) -> usize {
    object
        .fragments
        .iter()
        .flatten()
        .filter(|p| bbox.contains(p))
        .count()
}

/// Where a fragment can attach to the current chain.
enum Attachment {
    /// Fragment start meets the chain tail.
    TailToStart,
    /// Fragment end meets the chain tail (attach reversed).
    TailToEnd,
    /// Fragment end meets the chain head (prepend).
    HeadToEnd,
    /// Fragment start meets the chain head (prepend reversed).
    HeadToStart,
}

/// Greedily chain fragments by nearest matching endpoints.
///
/// The chain is seeded with the first fragment, so input that is already in
/// connected order comes back unchanged apart from duplicate joint points.
/// Remaining fragments whose endpoints stay beyond the tolerance are left
/// out and show up in `pieces`.
pub fn chain_fragments(fragments: &[Vec<Coordinate>], tolerance_km: f64) -> ChainResult {
    let mut pending: Vec<&Vec<Coordinate>> =
        fragments.iter().filter(|f| !f.is_empty()).collect();

    if pending.is_empty() {
        return ChainResult {
            points: Vec::new(),
            pieces: 0,
            merged_fragments: 0,
        };
    }

    let mut chain = pending.remove(0).clone();
    let mut merged = 1;

    loop {
        let head = chain[0];
        let tail = chain[chain.len() - 1];

        // Pick the pending fragment with the closest matching endpoint.
        let mut best: Option<(usize, Attachment, f64)> = None;
        for (index, fragment) in pending.iter().enumerate() {
            let start = fragment[0];
            let end = fragment[fragment.len() - 1];
            let candidates = [
                (Attachment::TailToStart, haversine_km(&tail, &start)),
                (Attachment::TailToEnd, haversine_km(&tail, &end)),
                (Attachment::HeadToEnd, haversine_km(&head, &end)),
                (Attachment::HeadToStart, haversine_km(&head, &start)),
            ];
            for (attachment, gap) in candidates {
                if gap <= tolerance_km && best.as_ref().map(|b| gap < b.2).unwrap_or(true) {
                    best = Some((index, attachment, gap));
                }
            }
        }

        let Some((index, attachment, _)) = best else {
            break;
        };

        let mut fragment = pending.remove(index).clone();
        match attachment {
            Attachment::TailToStart => append(&mut chain, fragment),
            Attachment::TailToEnd => {
                fragment.reverse();
                append(&mut chain, fragment);
            }
            Attachment::HeadToEnd => prepend(&mut chain, fragment),
            Attachment::HeadToStart => {
                fragment.reverse();
                prepend(&mut chain, fragment);
            }
        }
        merged += 1;
    }

    ChainResult {
        points: chain,
        pieces: 1 + pending.len(),
        merged_fragments: merged,
    }
}

fn append(chain: &mut Vec<Coordinate>, fragment: Vec<Coordinate>) {
    let skip_joint = fragment
        .first()
        .map(|first| haversine_km(&chain[chain.len() - 1], first) < JOINT_DUPLICATE_KM)
        .unwrap_or(false);
    let start = usize::from(skip_joint);
    chain.extend(fragment.into_iter().skip(start));
}

fn prepend(chain: &mut Vec<Coordinate>, mut fragment: Vec<Coordinate>) {
    let drop_joint = fragment
        .last()
        .map(|last| haversine_km(&chain[0], last) < JOINT_DUPLICATE_KM)
        .unwrap_or(false);
    if drop_joint {
        fragment.pop();
    }
    fragment.extend(chain.iter().copied());
    *chain = fragment;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new_unchecked(lon, lat)
    }

    fn portugal_bbox() -> BoundingBox {
        BoundingBox::new(32.0, -32.0, 43.0, -6.0).unwrap()
    }

    /// A dense in-bounds polyline stepping north ~111 m per point.
    fn long_fragment(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| coord(-7.5, 41.0 + 0.001 * i as f64)).collect()
    }

    #[test]
    fn test_resolve_selects_object_by_bounds_score() {
        // A short in-bounds object must beat a long out-of-bounds one,
        // and vice versa: score is inlier count, not length alone. Here the
        // foreign twin of the road is longer in points but entirely outside
        // the target territory.
        let foreign = RouteObject {
            object_kind: ObjectKind::Relation,
            id: 1,
            fragments: vec![(0..50).map(|i| coord(-1.5, 12.0 + 0.01 * i as f64)).collect()],
        };
        let domestic = RouteObject {
            object_kind: ObjectKind::Relation,
            id: 2,
            fragments: vec![long_fragment(700)],
        };

        let resolved = resolve(
            &[foreign, domestic],
            &portugal_bbox(),
            &ResolverConfig::default(),
        )
        .unwrap();
        assert_eq!(resolved.points.len(), 700);
        assert_eq!(resolved.object_kind, ObjectKind::Relation);
    }

    #[test]
    fn test_resolve_no_match_when_nothing_in_bounds() {
        let foreign = RouteObject {
            object_kind: ObjectKind::Way,
            id: 0,
            fragments: vec![vec![coord(-1.531, 12.368), coord(-1.53, 12.37)]],
        };
        let err = resolve(&[foreign], &portugal_bbox(), &ResolverConfig::default()).unwrap_err();
        assert_eq!(err, ResolveError::NoMatch);
    }

    #[test]
    fn test_resolve_empty_input() {
        let err = resolve(&[], &portugal_bbox(), &ResolverConfig::default()).unwrap_err();
        assert_eq!(err, ResolveError::Empty);
    }

    #[test]
    fn test_resolve_reports_fragmentation() {
        // Two pieces ~55 km apart cannot be chained at the default
        // tolerance and must be reported, not concatenated.
        let broken = RouteObject {
            object_kind: ObjectKind::Way,
            id: 0,
            fragments: vec![
                vec![coord(-7.5, 41.0), coord(-7.5, 41.01)],
                vec![coord(-7.5, 41.5), coord(-7.5, 41.51)],
            ],
        };
        let err = resolve(&[broken], &portugal_bbox(), &ResolverConfig::default()).unwrap_err();
        assert_eq!(err, ResolveError::Fragmented { pieces: 2 });
    }

    #[test]
    fn test_chain_already_ordered_is_idempotent() {
        let a = coord(-7.5, 41.0);
        let b = coord(-7.5, 41.001);
        let c = coord(-7.5, 41.002);
        let d = coord(-7.5, 41.003);
        let e = coord(-7.5, 41.004);

        let fragments = vec![vec![a, b, c], vec![c, d, e]];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 1);
        assert_eq!(result.points, vec![a, b, c, d, e]);

        // Chaining the chained result changes nothing.
        let again = chain_fragments(&[result.points.clone()], DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(again.points, result.points);
        assert_eq!(again.pieces, 1);
    }

    #[test]
    fn test_chain_reverses_backwards_fragment() {
        let a = coord(-7.5, 41.0);
        let b = coord(-7.5, 41.001);
        let c = coord(-7.5, 41.002);
        let d = coord(-7.5, 41.003);
        let e = coord(-7.5, 41.004);

        // Second fragment is stored end-first; its *end* meets the chain
        // tail, so it must be reversed before appending.
        let fragments = vec![vec![a, b, c], vec![e, d, c]];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 1);
        assert_eq!(result.points, vec![a, b, c, d, e]);
    }

    #[test]
    fn test_chain_extends_at_head() {
        let a = coord(-7.5, 41.0);
        let b = coord(-7.5, 41.001);
        let c = coord(-7.5, 41.002);
        let d = coord(-7.5, 41.003);

        // The seed fragment is the *later* part of the route.
        let fragments = vec![vec![c, d], vec![a, b, c]];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 1);
        assert_eq!(result.points, vec![a, b, c, d]);
    }

    #[test]
    fn test_chain_within_tolerance_keeps_near_joint_points() {
        // Endpoints ~110 m apart: connected at the default tolerance, but
        // both points are real geometry and must survive.
        let fragments = vec![
            vec![coord(-7.5, 41.0), coord(-7.5, 41.001)],
            vec![coord(-7.5, 41.002), coord(-7.5, 41.003)],
        ];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 1);
        assert_eq!(result.points.len(), 4);
    }

    #[test]
    fn test_chain_leaves_unreachable_fragment_out() {
        let fragments = vec![
            vec![coord(-7.5, 41.0), coord(-7.5, 41.001)],
            vec![coord(-8.5, 38.0), coord(-8.5, 38.001)],
        ];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 2);
        // The chain contains only the seed fragment's points.
        assert_eq!(result.points.len(), 2);
        assert_eq!(result.merged_fragments, 1);
    }

    #[test]
    fn test_chain_empty_input() {
        let result = chain_fragments(&[], DEFAULT_CHAIN_TOLERANCE_KM);
        assert!(result.points.is_empty());
        assert_eq!(result.pieces, 0);
    }

    #[test]
    fn test_chain_skips_empty_fragments() {
        let a = coord(-7.5, 41.0);
        let b = coord(-7.5, 41.001);
        let fragments = vec![Vec::new(), vec![a, b], Vec::new()];
        let result = chain_fragments(&fragments, DEFAULT_CHAIN_TOLERANCE_KM);
        assert_eq!(result.pieces, 1);
        assert_eq!(result.points, vec![a, b]);
    }
}
