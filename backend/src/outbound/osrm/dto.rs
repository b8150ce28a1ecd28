//! DTOs for decoding OSRM route responses.
//!
//! OSRM encodes GeoJSON positions as `[longitude, latitude]`; the mapping
//! into [`Coordinate`] happens here and nowhere else.

use serde::Deserialize;

use crate::domain::{Coordinate, Route};

/// Response code OSRM uses for a successful lookup.
const OK_CODE: &str = "Ok";
/// Response code OSRM uses when the points cannot be connected.
const NO_ROUTE_CODE: &str = "NoRoute";

#[derive(Debug, Deserialize)]
pub(super) struct OsrmResponseDto {
    pub(super) code: String,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) routes: Vec<OsrmRouteDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmRouteDto {
    pub(super) distance: f64,
    pub(super) duration: f64,
    pub(super) geometry: OsrmGeometryDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct OsrmGeometryDto {
    #[serde(default)]
    pub(super) coordinates: Vec<[f64; 2]>,
}

/// Outcome of interpreting a decoded body.
#[derive(Debug, PartialEq)]
pub(super) enum RouteOutcome {
    Found(Route),
    NoRoute,
    Rejected(String),
}

impl OsrmResponseDto {
    pub(super) fn into_outcome(self) -> RouteOutcome {
        if self.code == NO_ROUTE_CODE {
            return RouteOutcome::NoRoute;
        }
        if self.code != OK_CODE {
            let detail = self.message.unwrap_or_default();
            return RouteOutcome::Rejected(format!("{}: {detail}", self.code));
        }
        match self.routes.into_iter().next() {
            Some(route) => RouteOutcome::Found(route.into_domain()),
            None => RouteOutcome::NoRoute,
        }
    }
}

impl OsrmRouteDto {
    fn into_domain(self) -> Route {
        Route {
            polyline: self
                .geometry
                .coordinates
                .into_iter()
                .map(|[longitude, latitude]| Coordinate {
                    latitude,
                    longitude,
                })
                .collect(),
            distance: self.distance,
            duration: self.duration,
        }
    }
}
