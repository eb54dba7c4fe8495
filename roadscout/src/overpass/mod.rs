//! Line-geometry service integration: query building, fetching, and
//! response decoding.

mod client;
mod query;
mod response;

pub use client::{
    FetchConfig, OverpassClient, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES, DEFAULT_MIN_INTERVAL_MS,
    DEFAULT_TIMEOUT_SECS,
};
pub use query::{build_queries, candidate_refs, OverpassQuery};
pub use response::{route_objects, OverpassElement, OverpassMember, OverpassPoint, OverpassResponse, RouteObject};
