//! HTTP transport abstraction shared by the upstream service clients.
//!
//! The trait allows dependency injection: the real implementation wraps a
//! blocking reqwest client, while tests script responses without any
//! network. Failure classification lives here because every upstream
//! service (geometry, elevation, routing) needs the same transient/terminal
//! distinction.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Classified upstream fetch failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The service asked us to slow down (HTTP 429).
    #[error("rate limited by upstream service")]
    RateLimited,

    /// The request or gateway timed out (HTTP 504 or client timeout).
    #[error("gateway timeout")]
    GatewayTimeout,

    /// Connection-level or unexpected HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Rate limits and gateway timeouts are load symptoms; network and
    /// malformed failures are terminal for the query that produced them.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::GatewayTimeout)
    }
}

/// Blocking HTTP operations used by the service clients.
///
/// Implementations must be `Send + Sync`; the pipeline shares one transport
/// across clients.
pub trait HttpTransport: Send + Sync {
    /// Perform a GET request, returning the response body.
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;

    /// Perform a form POST (`application/x-www-form-urlencoded`), returning
    /// the response body.
    fn post_form(&self, url: &str, body: String, timeout: Duration) -> Result<String, FetchError>;
}

/// Real transport backed by a blocking reqwest client.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport with no client-level timeout; timeouts are set
    /// per request because the acquisition tiers use different budgets.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn classify_send_error(e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::GatewayTimeout
        } else {
            FetchError::Network(e.to_string())
        }
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<String, FetchError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if status.as_u16() == 504 {
            return Err(FetchError::GatewayTimeout);
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {}", status)));
        }
        response
            .text()
            .map_err(|e| FetchError::Network(format!("failed to read response: {}", e)))
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(Self::classify_send_error)?;
        Self::check_status(response)
    }

    fn post_form(&self, url: &str, body: String, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(Self::classify_send_error)?;
        Self::check_status(response)
    }
}

/// Minimum-interval gate between upstream requests.
///
/// The upstream services are shared community infrastructure; the enforced
/// delay is fair-use courtesy, not a performance knob. Thread-safe via
/// interior mutability.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter enforcing `min_interval` between `wait` returns.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Block until at least the minimum interval has passed since the last
    /// call, then record the new request time.
    pub fn wait(&self) {
        let mut last = self.last_request.lock().unwrap();
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}
