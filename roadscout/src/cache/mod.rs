//! Coordinate cache for resolved road geometry.
//!
//! Acquiring one road can cost dozens of upstream calls across fallback
//! tiers, so accepted polylines are persisted keyed by road reference and
//! reused for up to the configured TTL. The [`GeometryCache`] trait keeps the
//! store injectable: the pipeline takes any implementation, tests use the
//! in-memory one.
//!
//! Stale entries are treated as absent but never deleted from disk, which
//! keeps them around for manual inspection. Corrupt or legacy-format files
//! are logged and treated as misses, never as fatal errors.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;
use crate::road::Provenance;

/// Default entry lifetime: 30 days.
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Errors that can occur when writing cache entries.
///
/// Read-side failures never surface as errors; they are logged and mapped to
/// a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure while persisting an entry.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized.
    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A cached polyline together with its acquisition metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGeometry {
    /// Ordered route points.
    pub points: Vec<Coordinate>,
    /// Which tier originally produced the geometry.
    pub provenance: Provenance,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
}

/// Key-value store for resolved road geometry.
///
/// `get` returns `None` for missing, stale, or unreadable entries. `put`
/// overwrites whole entries; entries are never mutated in place.
pub trait GeometryCache: Send + Sync {
    /// Look up a fresh entry for a road reference.
    fn get(&self, road_ref: &str) -> Option<CachedGeometry>;

    /// Store (or replace) the entry for a road reference.
    fn put(&self, road_ref: &str, entry: &CachedGeometry) -> Result<(), CacheError>;
}

/// On-disk JSON file layout for one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    road_ref: String,
    source: Provenance,
    coordinates: Vec<[f64; 2]>,
    cached_at: String,
}

/// Filesystem-backed geometry cache, one JSON file per road.
pub struct FsGeometryCache {
    directory: PathBuf,
    ttl: Duration,
}

impl FsGeometryCache {
    /// Create a cache rooted at `directory` with the default 30-day TTL.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ttl: Duration::days(DEFAULT_TTL_DAYS),
        }
    }

    /// Override the entry lifetime.
    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl = Duration::days(days);
        self
    }

    /// Default cache directory under the platform cache root.
    pub fn default_directory() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roadscout")
            .join("geometry")
    }

    /// Directory this cache reads and writes.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, road_ref: &str) -> PathBuf {
        // Road references contain spaces ("N 222") and occasionally slashes;
        // normalize to a safe filename.
        let filename: String = road_ref
            .chars()
            .map(|c| if c == ' ' || c == '/' { '_' } else { c })
            .collect();
        self.directory.join(format!("{}.json", filename))
    }
}

impl GeometryCache for FsGeometryCache {
    fn get(&self, road_ref: &str) -> Option<CachedGeometry> {
        let path = self.entry_path(road_ref);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        // Legacy entries were bare coordinate arrays with no timestamp; they
        // cannot be age-checked, so they count as misses and get refetched.
        let file: CacheFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    road_ref,
                    path = %path.display(),
                    error = %e,
                    "unreadable cache entry, treating as miss"
                );
                return None;
            }
        };

        let cached_at = match DateTime::parse_from_rfc3339(&file.cached_at) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    road_ref,
                    error = %e,
                    "cache entry has invalid timestamp, treating as miss"
                );
                return None;
            }
        };

        let age = Utc::now() - cached_at;
        if age > self.ttl {
            tracing::debug!(
                road_ref,
                age_days = age.num_days(),
                "cache entry expired"
            );
            return None;
        }

        let points: Vec<Coordinate> = file
            .coordinates
            .iter()
            .map(|pair| Coordinate::new_unchecked(pair[0], pair[1]))
            .collect();
        if points.len() < 2 {
            tracing::warn!(road_ref, "cache entry has too few points, treating as miss");
            return None;
        }

        tracing::debug!(
            road_ref,
            points = points.len(),
            age_days = age.num_days(),
            source = file.source.as_str(),
            "cache hit"
        );

        Some(CachedGeometry {
            points,
            provenance: file.source,
            cached_at,
        })
    }

    fn put(&self, road_ref: &str, entry: &CachedGeometry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.directory)?;
        let file = CacheFile {
            road_ref: road_ref.to_string(),
            source: entry.provenance,
            coordinates: entry.points.iter().map(|p| p.to_pair()).collect(),
            cached_at: entry.cached_at.to_rfc3339(),
        };
        let path = self.entry_path(road_ref);
        fs::write(&path, serde_json::to_string(&file)?)?;
        tracing::debug!(
            road_ref,
            points = entry.points.len(),
            path = %path.display(),
            "cached geometry"
        );
        Ok(())
    }
}

/// In-memory geometry cache for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryGeometryCache {
    entries: Mutex<HashMap<String, CachedGeometry>>,
    ttl: Option<Duration>,
}

impl MemoryGeometryCache {
    /// Create an empty cache with no expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose entries expire after `days`.
    pub fn with_ttl_days(days: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(Duration::days(days)),
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GeometryCache for MemoryGeometryCache {
    fn get(&self, road_ref: &str) -> Option<CachedGeometry> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(road_ref)?;
        if let Some(ttl) = self.ttl {
            if Utc::now() - entry.cached_at > ttl {
                return None;
            }
        }
        Some(entry.clone())
    }

    fn put(&self, road_ref: &str, entry: &CachedGeometry) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap()
            .insert(road_ref.to_string(), entry.clone());
        Ok(())
    }
}
