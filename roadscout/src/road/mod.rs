//! Road definitions and acquired-geometry types.
//!
//! A [`RoadSpec`] is the static description of one road to process (loaded
//! from the curated roads file); a [`GeometryCandidate`] is a polyline
//! produced by one of the acquisition tiers, tagged with where it came from
//! so downstream consumers can trace provenance.

use serde::{Deserialize, Serialize};

use crate::geo::{BoundingBox, Coordinate};

/// Where a geometry candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Loaded from the coordinate cache.
    Cache,
    /// Single direct query against the line-geometry service.
    DirectQuery,
    /// Reassembled from per-sub-region queries.
    Segmented,
    /// Synthesized by the routing service from curated waypoints.
    WaypointRouted,
}

impl Provenance {
    /// Stable label used in cache files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Cache => "cache",
            Provenance::DirectQuery => "direct_query",
            Provenance::Segmented => "segmented",
            Provenance::WaypointRouted => "waypoint_routed",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upstream object type a geometry was derived from.
///
/// Major routes are represented upstream as a single aggregating relation;
/// minor roads as loose way objects. The distinction matters for query
/// ordering and for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// An aggregating route relation.
    Relation,
    /// Derived from raw way objects.
    Way,
}

impl ObjectKind {
    /// Stable label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Relation => "relation",
            ObjectKind::Way => "way",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered polyline with provenance tags.
///
/// Candidates are produced by acquisition strategies, gated by the quality
/// validator, and only then fed to the metrics engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryCandidate {
    /// Ordered route points, at least 2 for a usable candidate.
    pub points: Vec<Coordinate>,
    /// Which acquisition tier produced this geometry.
    pub provenance: Provenance,
    /// Upstream object type, when the geometry traces a real upstream
    /// object. Routed (synthesized) geometry has none.
    pub object_kind: Option<ObjectKind>,
}

impl GeometryCandidate {
    /// Create a candidate from acquired points.
    pub fn new(
        points: Vec<Coordinate>,
        provenance: Provenance,
        object_kind: Option<ObjectKind>,
    ) -> Self {
        Self {
            points,
            provenance,
            object_kind,
        }
    }

    /// Number of points in the polyline.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the polyline has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point of the route, if any.
    pub fn start(&self) -> Option<&Coordinate> {
        self.points.first()
    }

    /// Last point of the route, if any.
    pub fn end(&self) -> Option<&Coordinate> {
        self.points.last()
    }
}

/// A named coordinate along a route skeleton.
///
/// Ordered waypoint lists are curated as static configuration and drive the
/// routing fallback for roads whose upstream geometry is beyond repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Place name, for logs and section labels.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Waypoint {
    /// The waypoint's position.
    pub fn coord(&self) -> Coordinate {
        Coordinate::new_unchecked(self.lon, self.lat)
    }
}

/// Static definition of one road to process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSpec {
    /// Short road code, e.g. "N222".
    pub code: String,
    /// Human-readable name, e.g. "Peso da Régua → Pinhão".
    pub name: String,
    /// Reference tag as spelled upstream, e.g. "N 222".
    pub osm_ref: String,
    /// Query and validation bounds for this road.
    pub bbox: BoundingBox,
    /// Externally known road length, used for distance sanity checks.
    /// Absent for roads without a trusted reference length.
    #[serde(default)]
    pub expected_distance_km: Option<f64>,
    /// Well-known start label for the output record.
    #[serde(default)]
    pub start_point_name: String,
    /// Well-known end label for the output record.
    #[serde(default)]
    pub end_point_name: String,
    /// Curated route skeleton for the routing fallback; empty when the road
    /// has never needed it.
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_labels() {
        assert_eq!(Provenance::Cache.as_str(), "cache");
        assert_eq!(Provenance::DirectQuery.as_str(), "direct_query");
        assert_eq!(Provenance::Segmented.as_str(), "segmented");
        assert_eq!(Provenance::WaypointRouted.as_str(), "waypoint_routed");
        assert_eq!(format!("{}", Provenance::Segmented), "segmented");
    }

    #[test]
    fn test_candidate_endpoints() {
        let candidate = GeometryCandidate::new(
            vec![
                Coordinate::new_unchecked(-7.788, 41.164),
                Coordinate::new_unchecked(-7.548, 41.178),
            ],
            Provenance::DirectQuery,
            Some(ObjectKind::Relation),
        );
        assert_eq!(candidate.len(), 2);
        assert_eq!(candidate.start().unwrap().lon, -7.788);
        assert_eq!(candidate.end().unwrap().lon, -7.548);
    }

    #[test]
    fn test_road_spec_deserializes_with_defaults() {
        let json = r#"{
            "code": "N222",
            "name": "Peso da Régua → Pinhão",
            "osm_ref": "N 222",
            "bbox": { "south": 40.9, "west": -7.9, "north": 41.2, "east": -7.5 }
        }"#;
        let road: RoadSpec = serde_json::from_str(json).unwrap();
        assert_eq!(road.code, "N222");
        assert!(road.expected_distance_km.is_none());
        assert!(road.waypoints.is_empty());
        assert_eq!(road.start_point_name, "");
    }

    #[test]
    fn test_waypoint_coord_order() {
        let wp = Waypoint {
            name: "Chaves".to_string(),
            lat: 41.74,
            lon: -7.47,
        };
        let c = wp.coord();
        assert_eq!(c.lon, -7.47);
        assert_eq!(c.lat, 41.74);
    }
}
