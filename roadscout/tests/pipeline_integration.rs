//! End-to-end pipeline tests over scripted HTTP transports.
//!
//! These exercise the real tier implementations (direct query, waypoint
//! routing), the real resolver and validator, the filesystem cache, and the
//! metrics engine; only the network is scripted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use roadscout::cache::FsGeometryCache;
use roadscout::elevation::{ElevationClient, ElevationConfig};
use roadscout::geo::BoundingBox;
use roadscout::net::{FetchError, HttpTransport};
use roadscout::overpass::{FetchConfig, OverpassClient};
use roadscout::pipeline::RoadPipeline;
use roadscout::resolve::ResolverConfig;
use roadscout::road::{ObjectKind, Provenance, RoadSpec, Waypoint};
use roadscout::routing::{DirectionsClient, RoutingConfig};
use roadscout::strategy::{DirectQueryStrategy, WaypointRoutingStrategy};
use roadscout::validate::{QualityValidator, ValidatorConfig};

/// Replays queued responses in order; errors once exhausted.
struct ScriptedTransport {
    responses: Mutex<Vec<Result<String, FetchError>>>,
}

impl ScriptedTransport {
    fn new(mut responses: Vec<Result<String, FetchError>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
        }
    }

    fn next(&self) -> Result<String, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(FetchError::Network("script exhausted".to_string())))
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, _url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.next()
    }

    fn post_form(
        &self,
        _url: &str,
        _body: String,
        _timeout: Duration,
    ) -> Result<String, FetchError> {
        self.next()
    }
}

fn n222() -> RoadSpec {
    RoadSpec {
        code: "N222".to_string(),
        name: "Peso da Régua → Pinhão".to_string(),
        osm_ref: "N 222".to_string(),
        bbox: BoundingBox::new(40.9, -7.9, 41.2, -7.5).unwrap(),
        expected_distance_km: None,
        start_point_name: "Peso da Régua".to_string(),
        end_point_name: "Pinhão".to_string(),
        waypoints: vec![
            Waypoint {
                name: "Peso da Régua".to_string(),
                lat: 41.0,
                lon: -7.7,
            },
            Waypoint {
                name: "Pinhão".to_string(),
                lat: 41.12,
                lon: -7.7,
            },
        ],
    }
}

fn fetch_config() -> FetchConfig {
    FetchConfig::default()
        .with_min_request_interval(Duration::ZERO)
        .with_backoff_base(Duration::ZERO)
}

/// A 120-point relation running north at ~111 m spacing (dense enough to
/// pass the default validator).
fn relation_response() -> String {
    let geometry: Vec<String> = (0..120)
        .map(|i| format!(r#"{{ "lat": {}, "lon": -7.7 }}"#, 41.0 + 0.001 * i as f64))
        .collect();
    format!(
        r#"{{ "elements": [ {{ "type": "relation", "id": 42, "members": [
            {{ "type": "way", "ref": 1, "role": "", "geometry": [{}] }}
        ] }} ] }}"#,
        geometry.join(",")
    )
}

/// A 120-point routed leg over the same stretch.
fn directions_response() -> String {
    let coordinates: Vec<String> = (0..120)
        .map(|i| format!("[-7.7, {}]", 41.0 + 0.001 * i as f64))
        .collect();
    format!(
        r#"{{ "code": "Ok", "routes": [ {{ "geometry": {{ "coordinates": [{}] }}, "distance": 13200.0 }} ] }}"#,
        coordinates.join(",")
    )
}

fn elevation_response(ele: f64) -> String {
    format!(
        r#"{{ "features": [ {{ "properties": {{ "ele": {} }} }} ] }}"#,
        ele
    )
}

const EMPTY: &str = r#"{ "elements": [] }"#;

fn direct_tier(responses: Vec<Result<String, FetchError>>) -> DirectQueryStrategy {
    let transport = Arc::new(ScriptedTransport::new(responses));
    DirectQueryStrategy::new(
        Arc::new(OverpassClient::new(transport, fetch_config())),
        ResolverConfig::default(),
    )
}

#[test]
fn direct_query_road_is_processed_and_cached() {
    let cache_dir = tempfile::tempdir().unwrap();
    let pipeline = RoadPipeline::new(
        Box::new(FsGeometryCache::new(cache_dir.path())),
        vec![Box::new(direct_tier(vec![Ok(relation_response())]))],
        QualityValidator::new(ValidatorConfig::default()),
    );

    let record = pipeline.process(&n222()).unwrap();
    assert_eq!(record.code, "N222");
    assert_eq!(record.provenance, Provenance::DirectQuery);
    assert_eq!(record.object_kind, Some(ObjectKind::Relation));
    assert_eq!(record.coordinates.len(), 120);

    let quality = record.quality.as_ref().unwrap();
    assert!(quality.verdict.is_pass());
    assert!(quality.density > 2.0);

    // A straight northbound road: one straight run, no curves.
    assert!(record.metrics.distance_km > 12.0 && record.metrics.distance_km < 14.0);
    assert_eq!(record.metrics.curve_count_total, 0);
    assert_eq!(record.metrics.straight_count, 1);

    // Second run: the transport script is exhausted, only the cache can
    // answer, and it must.
    let cached = pipeline.process(&n222()).unwrap();
    assert_eq!(cached.provenance, Provenance::Cache);
    assert!(cached.quality.is_none());
    assert_eq!(cached.coordinates.len(), 120);
}

#[test]
fn fragmented_direct_query_escalates_to_waypoint_routing() {
    // The direct tier sees a hopelessly fragmented relation, then empties
    // for every other candidate spelling (4 relation + 4 way queries).
    let fragmented = r#"{ "elements": [ { "type": "relation", "id": 42, "members": [
        { "type": "way", "ref": 1, "role": "", "geometry": [
            { "lat": 41.0, "lon": -7.7 }, { "lat": 41.001, "lon": -7.7 } ] },
        { "type": "way", "ref": 2, "role": "", "geometry": [
            { "lat": 41.15, "lon": -7.55 }, { "lat": 41.151, "lon": -7.55 } ] }
    ] } ] }"#;
    let mut direct_responses = vec![Ok(fragmented.to_string())];
    direct_responses.extend((0..7).map(|_| Ok(EMPTY.to_string())));

    let routing_transport = Arc::new(ScriptedTransport::new(vec![Ok(directions_response())]));
    let waypoint_tier = WaypointRoutingStrategy::new(
        Arc::new(DirectionsClient::new(
            routing_transport,
            RoutingConfig::new("test-token").with_min_request_interval(Duration::ZERO),
        )),
        QualityValidator::new(ValidatorConfig::default().with_min_points(2)),
    );

    let cache_dir = tempfile::tempdir().unwrap();
    let pipeline = RoadPipeline::new(
        Box::new(FsGeometryCache::new(cache_dir.path())),
        vec![
            Box::new(direct_tier(direct_responses)),
            Box::new(waypoint_tier),
        ],
        QualityValidator::new(ValidatorConfig::default()),
    );

    let record = pipeline.process(&n222()).unwrap();
    assert_eq!(record.provenance, Provenance::WaypointRouted);
    assert!(record.object_kind.is_none());
    assert_eq!(record.coordinates.len(), 120);
}

#[test]
fn elevation_sampling_fills_climb_metrics() {
    // 120 points at the default interval of 10 samples indices
    // 0,10,...,110 plus the final point: 13 requests. Climb 100 m over the
    // first twelve samples, descend 40 m at the end.
    let mut elevation_responses: Vec<Result<String, FetchError>> = (0..12)
        .map(|i| Ok(elevation_response(500.0 + 10.0 * i as f64)))
        .collect();
    elevation_responses.push(Ok(elevation_response(570.0)));

    let elevation = ElevationClient::new(
        Arc::new(ScriptedTransport::new(elevation_responses)),
        ElevationConfig::new("test-token").with_min_request_interval(Duration::ZERO),
    );

    let cache_dir = tempfile::tempdir().unwrap();
    let pipeline = RoadPipeline::new(
        Box::new(FsGeometryCache::new(cache_dir.path())),
        vec![Box::new(direct_tier(vec![Ok(relation_response())]))],
        QualityValidator::new(ValidatorConfig::default()),
    )
    .with_elevation(elevation);

    let record = pipeline.process(&n222()).unwrap();
    assert_eq!(record.metrics.elevation_max, 610.0);
    assert_eq!(record.metrics.elevation_min, 500.0);
    assert_eq!(record.metrics.elevation_gain, 110.0);
    assert_eq!(record.metrics.elevation_loss, 40.0);
}
