//! Response models for the line-geometry service.
//!
//! The service returns a flat element list: relations carry their member
//! ways (each with inline geometry), plain way matches carry geometry
//! directly. This module deserializes that shape and regroups it into
//! [`RouteObject`]s, the unit the resolver scores and merges.

use serde::Deserialize;

use crate::geo::Coordinate;
use crate::road::ObjectKind;

/// Top-level response payload.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One element of the response: a relation or a way.
#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: u64,
    /// Inline geometry, present on way elements queried with `out geom`.
    #[serde(default)]
    pub geometry: Option<Vec<OverpassPoint>>,
    /// Member list, present on relation elements.
    #[serde(default)]
    pub members: Option<Vec<OverpassMember>>,
}

/// A relation member; only way members with geometry matter here.
#[derive(Debug, Deserialize)]
pub struct OverpassMember {
    #[serde(rename = "type")]
    pub member_type: String,
    #[serde(default)]
    pub geometry: Option<Vec<OverpassPoint>>,
}

/// One geometry vertex as the service spells it (lat first).
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct OverpassPoint {
    pub lat: f64,
    pub lon: f64,
}

impl OverpassPoint {
    fn to_coordinate(self) -> Coordinate {
        Coordinate::new_unchecked(self.lon, self.lat)
    }
}

/// A candidate route: ordered path fragments belonging to one logical
/// upstream object.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteObject {
    /// Upstream object type this route was built from.
    pub object_kind: ObjectKind,
    /// Upstream object id (relation id, or 0 for the aggregated way group).
    pub id: u64,
    /// Ordered fragments; each fragment is an ordered point sequence.
    pub fragments: Vec<Vec<Coordinate>>,
}

impl RouteObject {
    /// Total point count across all fragments.
    pub fn point_count(&self) -> usize {
        self.fragments.iter().map(|f| f.len()).sum()
    }
}

fn points_of(geometry: &[OverpassPoint]) -> Vec<Coordinate> {
    geometry.iter().map(|p| p.to_coordinate()).collect()
}

/// Regroup a response into candidate route objects.
///
/// Each relation becomes one object whose fragments are its member ways in
/// member order. Plain way matches are pooled into a single way-derived
/// object: within the queried bounds they are fragments of the same road,
/// and pooling them lets the resolver chain them like relation members.
pub fn route_objects(response: &OverpassResponse) -> Vec<RouteObject> {
    let mut objects = Vec::new();
    let mut way_fragments = Vec::new();

    for element in &response.elements {
        match element.element_type.as_str() {
            "relation" => {
                let fragments: Vec<Vec<Coordinate>> = element
                    .members
                    .iter()
                    .flatten()
                    .filter(|m| m.member_type == "way")
                    .filter_map(|m| m.geometry.as_deref())
                    .map(points_of)
                    .filter(|f| !f.is_empty())
                    .collect();
                if !fragments.is_empty() {
                    objects.push(RouteObject {
                        object_kind: ObjectKind::Relation,
                        id: element.id,
                        fragments,
                    });
                }
            }
            "way" => {
                if let Some(geometry) = &element.geometry {
                    let points = points_of(geometry);
                    if !points.is_empty() {
                        way_fragments.push(points);
                    }
                }
            }
            _ => {}
        }
    }

    if !way_fragments.is_empty() {
        objects.push(RouteObject {
            object_kind: ObjectKind::Way,
            id: 0,
            fragments: way_fragments,
        });
    }

    objects
}
