// geo/mod.rs — coordinates and geodesic distance.
//
// `Coordinate` is the single position type used everywhere: task bindings,
// location fixes, REST payloads, CLI arguments. Construction validates
// ranges so the reminder engine never sees a malformed position.

pub mod distance;

pub use distance::haversine_meters;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a coordinate could not be built or parsed.
#[derive(Debug, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} out of range (-90..=90)")]
    LatitudeRange(f64),
    #[error("longitude {0} out of range (-180..=180)")]
    LongitudeRange(f64),
    #[error("coordinate components must be finite")]
    NotFinite,
    #[error("expected \"LAT,LON\", got {0:?}")]
    Malformed(String),
}

impl Coordinate {
    /// Build a validated coordinate. Rejects NaN, infinities, and
    /// out-of-range degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to another coordinate in meters.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        haversine_meters(*self, *other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    /// Parse `"LAT,LON"` — the format used by CLI arguments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| CoordinateError::Malformed(s.to_string()))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoordinateError::Malformed(s.to_string()))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| CoordinateError::Malformed(s.to_string()))?;
        Self::new(latitude, longitude)
    }
}
