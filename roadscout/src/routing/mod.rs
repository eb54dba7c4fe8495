//! Client for the routing/directions service.
//!
//! Last-resort geometry source: given an ordered list of curated waypoints,
//! the service returns a driveable path between them. The result is a
//! *synthesized* route chosen by the routing engine, not a literal trace of
//! the historical road; a slightly re-optimized path beats having no data.
//!
//! The service caps waypoints per request, so long skeletons are split into
//! overlapping batches (the last waypoint of one batch is the first of the
//! next) and the duplicated join point is dropped on concatenation.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::geo::Coordinate;
use crate::net::{FetchError, HttpTransport, RateLimiter};
use crate::road::Waypoint;

/// Default service base URL (driving profile).
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/directions/v5/mapbox/driving";

/// The service's waypoint cap per request.
pub const MAX_WAYPOINTS_PER_REQUEST: usize = 25;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Routing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// Fewer than two waypoints were supplied.
    #[error("need at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    /// The HTTP request failed.
    #[error("routing request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The service answered but produced no route.
    #[error("routing service returned no route: {0}")]
    NoRoute(String),

    /// The response could not be understood.
    #[error("malformed routing response: {0}")]
    Malformed(String),
}

/// Configuration for the routing client.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Service base URL.
    pub base_url: String,
    /// API access token appended to each request.
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum delay between requests.
    pub min_request_interval: Duration,
    /// Waypoint cap per request.
    pub max_waypoints_per_request: usize,
}

impl RoutingConfig {
    /// Create a config with the default endpoint and the given token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_request_interval: Duration::from_millis(200),
            max_waypoints_per_request: MAX_WAYPOINTS_PER_REQUEST,
        }
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the minimum inter-request delay.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Set the waypoint cap per request.
    pub fn with_max_waypoints_per_request(mut self, max: usize) -> Self {
        self.max_waypoints_per_request = max.max(2);
        self
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: DirectionsGeometry,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Blocking client for the routing service.
pub struct DirectionsClient {
    transport: Arc<dyn HttpTransport>,
    config: RoutingConfig,
    limiter: RateLimiter,
}

impl DirectionsClient {
    /// Create a client over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>, config: RoutingConfig) -> Self {
        let limiter = RateLimiter::new(config.min_request_interval);
        Self {
            transport,
            config,
            limiter,
        }
    }

    /// The configured waypoint cap per request.
    pub fn max_waypoints_per_request(&self) -> usize {
        self.config.max_waypoints_per_request
    }

    /// Request a routed path through up to the per-request waypoint cap.
    pub fn route(&self, waypoints: &[Waypoint]) -> Result<Vec<Coordinate>, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::TooFewWaypoints(waypoints.len()));
        }
        if waypoints.len() > self.config.max_waypoints_per_request {
            return Err(RoutingError::Malformed(format!(
                "{} waypoints exceed the per-request cap of {}",
                waypoints.len(),
                self.config.max_waypoints_per_request
            )));
        }

        let path: Vec<String> = waypoints
            .iter()
            .map(|wp| format!("{},{}", wp.lon, wp.lat))
            .collect();
        let url = format!(
            "{}/{}?geometries=geojson&overview=full&steps=false&access_token={}",
            self.config.base_url,
            path.join(";"),
            self.config.access_token
        );

        self.limiter.wait();
        tracing::debug!(
            waypoints = waypoints.len(),
            from = %waypoints[0].name,
            to = %waypoints[waypoints.len() - 1].name,
            "requesting routed path"
        );

        let raw = self.transport.get(&url, self.config.timeout)?;
        let response: DirectionsResponse =
            serde_json::from_str(&raw).map_err(|e| RoutingError::Malformed(e.to_string()))?;

        if response.code != "Ok" {
            return Err(RoutingError::NoRoute(format!(
                "{}: {}",
                response.code,
                response.message.unwrap_or_default()
            )));
        }

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::NoRoute("empty route list".to_string()))?;

        tracing::debug!(
            points = route.geometry.coordinates.len(),
            distance_km = format!("{:.2}", route.distance / 1000.0),
            "routed path received"
        );

        route
            .geometry
            .coordinates
            .into_iter()
            .map(Coordinate::from_pair)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RoutingError::Malformed(e.to_string()))
    }
}

/// Split `len` waypoints into overlapping batch ranges of at most
/// `max_per_batch`, each batch starting at the previous batch's last
/// waypoint so the routed legs connect.
pub fn batch_ranges(len: usize, max_per_batch: usize) -> Vec<(usize, usize)> {
    if len < 2 {
        return Vec::new();
    }
    let max_per_batch = max_per_batch.max(2);
    if len <= max_per_batch {
        return vec![(0, len)];
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < len - 1 {
        let end = (start + max_per_batch).min(len);
        ranges.push((start, end));
        if end == len {
            break;
        }
        // Overlap by one waypoint so consecutive legs share an endpoint.
        start = end - 1;
    }
    ranges
}
