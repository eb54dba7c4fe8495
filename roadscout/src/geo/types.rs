//! Core geographic types shared across the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors for invalid geographic values.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    /// Latitude outside [-90, 90] or not finite.
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Bounding box edges are inverted or degenerate.
    #[error("invalid bounding box: {0}")]
    InvalidBounds(String),
}

/// A geographic point as an ordered (longitude, latitude) pair.
///
/// The pair order follows the upstream wire format (`[lon, lat]`), which is
/// the opposite of the common spoken "lat/lon" order. Sequence order within a
/// polyline is significant: it encodes route direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Longitude in degrees, [-180, 180].
    pub lon: f64,
    /// Latitude in degrees, [-90, 90].
    pub lat: f64,
}

impl Coordinate {
    /// Create a coordinate, validating ranges.
    pub fn new(lon: f64, lat: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(GeoError::InvalidLatitude(lat));
        }
        if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(GeoError::InvalidLongitude(lon));
        }
        Ok(Self { lon, lat })
    }

    /// Create a coordinate without range validation.
    ///
    /// Used for points that already passed validation upstream (e.g. parsed
    /// from a response that is bounds-checked as a whole later).
    pub fn new_unchecked(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// The `[lon, lat]` pair used by cache files and API payloads.
    pub fn to_pair(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    /// Build from a `[lon, lat]` pair, validating ranges.
    pub fn from_pair(pair: [f64; 2]) -> Result<Self, GeoError> {
        Self::new(pair[0], pair[1])
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

/// A rectangular geographic filter: (south, west, north, east).
///
/// Used both to scope upstream queries to the target territory and to
/// validate that returned geometry actually lies inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern latitude bound in degrees.
    pub south: f64,
    /// Western longitude bound in degrees.
    pub west: f64,
    /// Northern latitude bound in degrees.
    pub north: f64,
    /// Eastern longitude bound in degrees.
    pub east: f64,
}

impl BoundingBox {
    /// Create a bounding box, validating edge ordering and ranges.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, GeoError> {
        for lat in [south, north] {
            if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
                return Err(GeoError::InvalidLatitude(lat));
            }
        }
        for lon in [west, east] {
            if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(GeoError::InvalidLongitude(lon));
            }
        }
        if south >= north {
            return Err(GeoError::InvalidBounds(format!(
                "south {} must be below north {}",
                south, north
            )));
        }
        if west >= east {
            return Err(GeoError::InvalidBounds(format!(
                "west {} must be left of east {}",
                west, east
            )));
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Check whether a coordinate lies inside the box (edges inclusive).
    pub fn contains(&self, coord: &Coordinate) -> bool {
        (self.south..=self.north).contains(&coord.lat)
            && (self.west..=self.east).contains(&coord.lon)
    }

    /// Latitudinal extent in degrees.
    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Longitudinal extent in degrees.
    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    /// Split into `n` contiguous sub-boxes along the longer axis.
    ///
    /// Sub-boxes are returned south-to-north (or west-to-east) so that
    /// adjacent results share an edge and stitch cleanly.
    pub fn split(&self, n: usize) -> Vec<BoundingBox> {
        let n = n.max(1);
        let mut parts = Vec::with_capacity(n);
        if self.height_deg() >= self.width_deg() {
            let step = self.height_deg() / n as f64;
            for i in 0..n {
                parts.push(BoundingBox {
                    south: self.south + step * i as f64,
                    west: self.west,
                    north: self.south + step * (i + 1) as f64,
                    east: self.east,
                });
            }
        } else {
            let step = self.width_deg() / n as f64;
            for i in 0..n {
                parts.push(BoundingBox {
                    south: self.south,
                    west: self.west + step * i as f64,
                    north: self.north,
                    east: self.west + step * (i + 1) as f64,
                });
            }
        }
        parts
    }

    /// Grow the box by `buffer` degrees on every side, clamped to valid
    /// ranges.
    ///
    /// Used when deriving a query box from two waypoints: the road between
    /// them is rarely a straight line, so the box needs slack around it.
    pub fn expanded(&self, buffer: f64) -> BoundingBox {
        BoundingBox {
            south: (self.south - buffer).max(MIN_LAT),
            west: (self.west - buffer).max(MIN_LON),
            north: (self.north + buffer).min(MAX_LAT),
            east: (self.east + buffer).min(MAX_LON),
        }
    }

    /// The smallest box covering two coordinates.
    pub fn around(a: &Coordinate, b: &Coordinate) -> BoundingBox {
        BoundingBox {
            south: a.lat.min(b.lat),
            west: a.lon.min(b.lon),
            north: a.lat.max(b.lat),
            east: a.lon.max(b.lon),
        }
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "S={:.3} W={:.3} N={:.3} E={:.3}",
            self.south, self.west, self.north, self.east
        )
    }
}
