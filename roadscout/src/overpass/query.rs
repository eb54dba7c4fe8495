//! Query construction for the line-geometry service.
//!
//! A road reference rarely matches upstream on the first try: the national
//! road network is tagged inconsistently ("N 2", "N2", "EN 2", "EN2" all
//! occur), and major routes exist both as a single aggregating relation and
//! as hundreds of loose way fragments. The builder therefore expands one
//! reference into an ordered list of candidate queries: every reference
//! spelling as a relation query first, then the same spellings as way
//! queries. Relations come first because resolving one avoids the fragment
//! explosion entirely.

use regex::Regex;
use std::sync::OnceLock;

use crate::geo::BoundingBox;
use crate::road::ObjectKind;

/// One renderable upstream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassQuery {
    /// The reference spelling this query tries.
    pub reference: String,
    /// Which object type the query asks for.
    pub object_kind: ObjectKind,
    /// The rendered Overpass QL.
    pub ql: String,
}

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{1,3})\s?(\d+(?:-\d+)?)$").expect("reference pattern is valid")
    })
}

/// Alternate national prefixes for a given prefix.
///
/// The national network drops the "E" ("Estrada") prefix inconsistently:
/// "EN 2" and "N 2" name the same road, likewise municipal "EM"/"M" and
/// regional "ER"/"R".
fn prefix_alternates(prefix: &str) -> Vec<String> {
    let upper = prefix.to_uppercase();
    let mut alternates = vec![upper.clone()];
    let paired = match upper.as_str() {
        "N" => Some("EN"),
        "EN" => Some("N"),
        "M" => Some("EM"),
        "EM" => Some("M"),
        "R" => Some("ER"),
        "ER" => Some("R"),
        _ => None,
    };
    if let Some(other) = paired {
        alternates.push(other.to_string());
    }
    alternates
}

/// Expand a road reference into ordered candidate spellings.
///
/// The given spelling's prefix comes first, and within each prefix the
/// spaced form precedes the compact one (upstream ref tags usually carry
/// the space). Malformed references yield an empty list.
pub fn candidate_refs(road_ref: &str) -> Vec<String> {
    let trimmed = road_ref.trim();
    let captures = match ref_pattern().captures(trimmed) {
        Some(captures) => captures,
        None => return Vec::new(),
    };
    let prefix = &captures[1];
    let number = &captures[2];

    let mut refs = Vec::new();
    for alternate in prefix_alternates(prefix) {
        for spelling in [
            format!("{} {}", alternate, number),
            format!("{}{}", alternate, number),
        ] {
            if !refs.contains(&spelling) {
                refs.push(spelling);
            }
        }
    }
    refs
}

fn bbox_clause(bbox: &BoundingBox) -> String {
    format!(
        "({},{},{},{})",
        bbox.south, bbox.west, bbox.north, bbox.east
    )
}

fn render_ql(reference: &str, kind: ObjectKind, bbox: &BoundingBox, timeout_secs: u64) -> String {
    match kind {
        ObjectKind::Relation => format!(
            "[out:json][timeout:{}];relation[\"ref\"=\"{}\"][\"route\"=\"road\"]{};out geom;",
            timeout_secs,
            reference,
            bbox_clause(bbox)
        ),
        ObjectKind::Way => format!(
            "[out:json][timeout:{}];way[\"ref\"=\"{}\"][\"highway\"]{};out geom;",
            timeout_secs,
            reference,
            bbox_clause(bbox)
        ),
    }
}

/// Build the ordered candidate query list for a road reference.
///
/// All relation queries precede all way queries; within each kind the
/// reference spellings keep the [`candidate_refs`] order. Pure function:
/// malformed references produce an empty list, nothing else can fail.
pub fn build_queries(road_ref: &str, bbox: &BoundingBox, timeout_secs: u64) -> Vec<OverpassQuery> {
    let refs = candidate_refs(road_ref);
    let mut queries = Vec::with_capacity(refs.len() * 2);
    for kind in [ObjectKind::Relation, ObjectKind::Way] {
        for reference in &refs {
            queries.push(OverpassQuery {
                reference: reference.clone(),
                object_kind: kind,
                ql: render_ql(reference, kind, bbox, timeout_secs),
            });
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bbox() -> BoundingBox {
        BoundingBox::new(40.9, -7.9, 41.2, -7.5).unwrap()
    }

    #[test]
    fn test_candidate_refs_expands_prefix_and_spacing() {
        assert_eq!(
            candidate_refs("N 222"),
            vec!["N 222", "N222", "EN 222", "EN222"]
        );
    }

    #[test]
    fn test_candidate_refs_preserves_given_prefix_first() {
        assert_eq!(candidate_refs("EN 2"), vec!["EN 2", "EN2", "N 2", "N2"]);
    }

    #[test]
    fn test_candidate_refs_compact_input() {
        assert_eq!(
            candidate_refs("N222"),
            vec!["N 222", "N222", "EN 222", "EN222"]
        );
    }

    #[test]
    fn test_candidate_refs_unpaired_prefix() {
        assert_eq!(candidate_refs("IC 5"), vec!["IC 5", "IC5"]);
    }

    #[test]
    fn test_candidate_refs_dashed_number() {
        assert_eq!(candidate_refs("N 339-1"), vec!["N 339-1", "N339-1", "EN 339-1", "EN339-1"]);
    }

    #[test]
    fn test_candidate_refs_malformed_input() {
        assert!(candidate_refs("").is_empty());
        assert!(candidate_refs("222").is_empty());
        assert!(candidate_refs("not a road").is_empty());
    }

    #[test]
    fn test_build_queries_relations_before_ways() {
        let queries = build_queries("N 222", &test_bbox(), 25);
        assert_eq!(queries.len(), 8);
        assert!(queries[..4]
            .iter()
            .all(|q| q.object_kind == ObjectKind::Relation));
        assert!(queries[4..].iter().all(|q| q.object_kind == ObjectKind::Way));
        assert_eq!(queries[0].reference, "N 222");
        assert_eq!(queries[4].reference, "N 222");
    }

    #[test]
    fn test_build_queries_ql_contents() {
        let queries = build_queries("N 222", &test_bbox(), 25);
        let relation = &queries[0];
        assert!(relation.ql.starts_with("[out:json][timeout:25];"));
        assert!(relation.ql.contains("relation[\"ref\"=\"N 222\"]"));
        assert!(relation.ql.contains("(40.9,-7.9,41.2,-7.5)"));
        assert!(relation.ql.ends_with("out geom;"));

        let way = &queries[4];
        assert!(way.ql.contains("way[\"ref\"=\"N 222\"][\"highway\"]"));
    }

    #[test]
    fn test_build_queries_malformed_reference() {
        assert!(build_queries("???", &test_bbox(), 25).is_empty());
    }
}
