//! Geographic primitives shared by trips, fares, and drivers.

use ::geohash::{Coord, GeohashError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Geohash precision used when indexing driver locations.
pub const DRIVER_GEOHASH_PRECISION: usize = 9;

/// Validation errors for [`Coordinate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateValidationError {
    /// Latitude was not finite or fell outside `[-90, 90]`.
    #[error("latitude {value} must be a finite number within [-90, 90]")]
    Latitude { value: f64 },
    /// Longitude was not finite or fell outside `[-180, 180]`.
    #[error("longitude {value} must be a finite number within [-180, 180]")]
    Longitude { value: f64 },
}

/// WGS84 point.
///
/// # Examples
/// ```
/// use dispatch_backend::domain::Coordinate;
///
/// let point = Coordinate::new(51.5074, -0.1278).expect("valid coordinate");
/// assert_eq!(point.latitude, 51.5074);
/// assert!(Coordinate::new(f64::NAN, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    #[schema(example = 52.5200)]
    pub latitude: f64,
    #[schema(example = 13.4050)]
    pub longitude: f64,
}

impl Coordinate {
    /// Construct a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateValidationError> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Check the range invariants on an already-built value.
    ///
    /// Coordinates decoded from the wire bypass [`Coordinate::new`], so
    /// services call this before trusting them.
    pub fn validate(&self) -> Result<(), CoordinateValidationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CoordinateValidationError::Latitude {
                value: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CoordinateValidationError::Longitude {
                value: self.longitude,
            });
        }
        Ok(())
    }
}

/// Path between a pickup and a destination as reported by the route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Ordered points along the path.
    pub polyline: Vec<Coordinate>,
    /// Distance in metres.
    pub distance: f64,
    /// Duration in seconds.
    pub duration: f64,
}

/// Encode a coordinate as a base-32 geohash of `precision` characters.
///
/// Fails for a point off the globe or a precision the encoder cannot produce.
///
/// # Examples
/// ```
/// use dispatch_backend::domain::{Coordinate, geohash};
///
/// let point = Coordinate { latitude: 42.6, longitude: -5.6 };
/// assert_eq!(geohash(point, 5).expect("valid point"), "ezs42");
/// ```
pub fn geohash(coordinate: Coordinate, precision: usize) -> Result<String, GeohashError> {
    ::geohash::encode(
        Coord {
            x: coordinate.longitude,
            y: coordinate.latitude,
        },
        precision,
    )
}
