//! Client for the line-geometry query service.
//!
//! Wraps the shared HTTP transport with the service-specific concerns:
//! form-encoded QL submission, a minimum inter-request delay, and bounded
//! retry with exponential backoff on transient failures. Retries are
//! sequential and bounded because every attempt burns shared upstream
//! quota.

use std::sync::Arc;
use std::time::Duration;

use crate::net::{FetchError, HttpTransport, RateLimiter};

use super::query::OverpassQuery;
use super::response::OverpassResponse;

/// Default public endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Default per-request timeout for direct queries.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default minimum delay between requests.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;

/// Default retry attempts for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for the geometry service client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Service endpoint URL.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum delay between consecutive requests.
    pub min_request_interval: Duration,
    /// Attempts per query before a transient failure is surfaced.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt (2s, 4s, 8s by default).
    pub backoff_base: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_request_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl FetchConfig {
    /// Set the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the minimum inter-request delay.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Set the retry budget for transient failures.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the first backoff delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }
}

/// Blocking client for the line-geometry service.
pub struct OverpassClient {
    transport: Arc<dyn HttpTransport>,
    config: FetchConfig,
    limiter: RateLimiter,
}

impl OverpassClient {
    /// Create a client over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>, config: FetchConfig) -> Self {
        let limiter = RateLimiter::new(config.min_request_interval);
        Self {
            transport,
            config,
            limiter,
        }
    }

    /// The configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Execute one candidate query and parse its response.
    ///
    /// Transient failures (rate limit, gateway timeout) are retried with
    /// exponential backoff up to the configured budget; terminal failures
    /// return immediately so the caller can move to the next candidate.
    pub fn fetch(&self, query: &OverpassQuery) -> Result<OverpassResponse, FetchError> {
        self.fetch_with_timeout(query, self.config.timeout)
    }

    /// Execute one candidate query with an explicit timeout.
    ///
    /// The segmentation tier uses a reduced per-segment budget here.
    pub fn fetch_with_timeout(
        &self,
        query: &OverpassQuery,
        timeout: Duration,
    ) -> Result<OverpassResponse, FetchError> {
        let body = format!("data={}", urlencoding::encode(&query.ql));

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.wait();

            tracing::debug!(
                reference = %query.reference,
                object_kind = query.object_kind.as_str(),
                attempt,
                "querying line-geometry service"
            );

            match self
                .transport
                .post_form(&self.config.endpoint, body.clone(), timeout)
            {
                Ok(raw) => {
                    return serde_json::from_str(&raw)
                        .map_err(|e| FetchError::Malformed(e.to_string()));
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        reference = %query.reference,
                        attempt,
                        error = %e,
                        delay_secs = delay.as_secs_f64(),
                        "transient fetch failure, backing off"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    tracing::warn!(
                        reference = %query.reference,
                        attempt,
                        error = %e,
                        "fetch failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
