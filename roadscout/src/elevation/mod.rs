//! Elevation sampling for resolved routes.
//!
//! The elevation service is queried one coordinate at a time and is
//! quota-limited, so routes are sampled every Nth point rather than
//! exhaustively; the first and last points are always included. Points the
//! service has no data for are skipped. A route whose elevation fetch fails
//! entirely still succeeds overall; the metrics just carry zeroed
//! elevation aggregates.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::geo::Coordinate;
use crate::net::{HttpTransport, RateLimiter};

/// Default base URL of the terrain tile-query service.
pub const DEFAULT_BASE_URL: &str =
    "https://api.mapbox.com/v4/mapbox.mapbox-terrain-v2/tilequery";

/// Sample every Nth route point by default.
pub const DEFAULT_SAMPLE_INTERVAL: usize = 10;

/// Default minimum delay between elevation requests (max ~20 req/s).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 50;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the elevation client.
#[derive(Debug, Clone)]
pub struct ElevationConfig {
    /// Service base URL.
    pub base_url: String,
    /// API access token appended to each request.
    pub access_token: String,
    /// Sample every Nth point.
    pub sample_interval: usize,
    /// Minimum delay between requests.
    pub min_request_interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ElevationConfig {
    /// Create a config with the default endpoint and the given token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            min_request_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the sampling interval.
    pub fn with_sample_interval(mut self, interval: usize) -> Self {
        self.sample_interval = interval.max(1);
        self
    }

    /// Set the minimum inter-request delay.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }
}

#[derive(Debug, Deserialize)]
struct TilequeryResponse {
    #[serde(default)]
    features: Vec<TilequeryFeature>,
}

#[derive(Debug, Deserialize)]
struct TilequeryFeature {
    properties: TilequeryProperties,
}

#[derive(Debug, Deserialize)]
struct TilequeryProperties {
    #[serde(default)]
    ele: Option<f64>,
}

/// Blocking client for the elevation service.
pub struct ElevationClient {
    transport: Arc<dyn HttpTransport>,
    config: ElevationConfig,
    limiter: RateLimiter,
}

impl ElevationClient {
    /// Create a client over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>, config: ElevationConfig) -> Self {
        let limiter = RateLimiter::new(config.min_request_interval);
        Self {
            transport,
            config,
            limiter,
        }
    }

    /// Fetch the elevation of a single point, in meters.
    ///
    /// Returns `None` when the request fails or the service has no data;
    /// elevation gaps degrade the metrics, they never fail the road.
    pub fn elevation_at(&self, point: &Coordinate) -> Option<f64> {
        let url = format!(
            "{}/{},{}.json?layers=contour&limit=1&access_token={}",
            self.config.base_url, point.lon, point.lat, self.config.access_token
        );

        self.limiter.wait();
        let raw = match self.transport.get(&url, self.config.timeout) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(point = %point, error = %e, "elevation fetch failed");
                return None;
            }
        };

        let response: TilequeryResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(point = %point, error = %e, "unreadable elevation response");
                return None;
            }
        };

        response.features.first().and_then(|f| f.properties.ele)
    }

    /// Sample elevations along a route at the configured interval.
    ///
    /// The returned series holds only the samples the service answered; it
    /// may be shorter than the sampled index list or empty.
    pub fn sample_route(&self, points: &[Coordinate]) -> Vec<f64> {
        let indices = sampled_indices(points.len(), self.config.sample_interval);
        tracing::debug!(
            points = points.len(),
            samples = indices.len(),
            interval = self.config.sample_interval,
            "sampling route elevation"
        );

        let mut elevations = Vec::with_capacity(indices.len());
        let mut misses = 0usize;
        for index in indices {
            match self.elevation_at(&points[index]) {
                Some(elevation) => elevations.push(elevation),
                None => misses += 1,
            }
        }

        if misses > 0 {
            tracing::warn!(misses, collected = elevations.len(), "elevation gaps in route");
        }
        elevations
    }
}

/// Indices to sample: every Nth point, always including the first and last.
pub fn sampled_indices(len: usize, interval: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let interval = interval.max(1);
    let mut indices: Vec<usize> = (0..len).step_by(interval).collect();
    let last = len - 1;
    if *indices.last().expect("len > 0 yields at least index 0") != last {
        indices.push(last);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tests::MockTransport;
    use crate::net::FetchError;

    fn fast_config() -> ElevationConfig {
        ElevationConfig::new("test-token").with_min_request_interval(Duration::ZERO)
    }

    fn feature(ele: f64) -> String {
        format!(
            r#"{{ "features": [ {{ "properties": {{ "ele": {} }} }} ] }}"#,
            ele
        )
    }

    #[test]
    fn test_sampled_indices_include_endpoints() {
        assert_eq!(sampled_indices(25, 10), vec![0, 10, 20, 24]);
        assert_eq!(sampled_indices(21, 10), vec![0, 10, 20]);
        assert_eq!(sampled_indices(5, 10), vec![0, 4]);
        assert_eq!(sampled_indices(1, 10), vec![0]);
        assert!(sampled_indices(0, 10).is_empty());
    }

    #[test]
    fn test_elevation_at_parses_meters() {
        let transport = Arc::new(MockTransport::new(vec![Ok(feature(523.0))]));
        let client = ElevationClient::new(transport.clone(), fast_config());

        let point = Coordinate::new_unchecked(-7.5, 40.2833);
        assert_eq!(client.elevation_at(&point), Some(523.0));

        let url = transport.requests.lock().unwrap()[0].clone();
        assert!(url.contains("-7.5,40.2833.json"));
        assert!(url.contains("layers=contour"));
    }

    #[test]
    fn test_elevation_at_no_data() {
        let transport = Arc::new(MockTransport::new(vec![Ok(
            r#"{ "features": [] }"#.to_string()
        )]));
        let client = ElevationClient::new(transport, fast_config());
        assert_eq!(
            client.elevation_at(&Coordinate::new_unchecked(-7.5, 40.0)),
            None
        );
    }

    #[test]
    fn test_elevation_at_swallows_fetch_errors() {
        let transport = Arc::new(MockTransport::new(vec![Err(FetchError::RateLimited)]));
        let client = ElevationClient::new(transport, fast_config());
        assert_eq!(
            client.elevation_at(&Coordinate::new_unchecked(-7.5, 40.0)),
            None
        );
    }

    #[test]
    fn test_sample_route_skips_gaps() {
        // Three samples requested (indices 0, 2, 4); the middle one has no
        // data.
        let transport = Arc::new(MockTransport::new(vec![
            Ok(feature(100.0)),
            Ok(r#"{ "features": [] }"#.to_string()),
            Ok(feature(200.0)),
        ]));
        let config = fast_config().with_sample_interval(2);
        let client = ElevationClient::new(transport.clone(), config);

        let points: Vec<Coordinate> = (0..5)
            .map(|i| Coordinate::new_unchecked(-7.5, 41.0 + 0.001 * i as f64))
            .collect();
        let elevations = client.sample_route(&points);
        assert_eq!(elevations, vec![100.0, 200.0]);
        assert_eq!(transport.request_count(), 3);
    }
}
