//! Driven port for road routing between two points.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{Coordinate, Route};

define_port_error! {
    /// Errors surfaced while asking the routing service for a path.
    pub enum RouteProviderError {
        /// The request never produced a response.
        Transport { message: String } => "route provider transport failed: {message}",
        /// The routing service took longer than the configured timeout.
        Timeout { message: String } => "route provider timed out: {message}",
        /// The routing service answered with a non-success status.
        Status { status: u16, message: String } =>
            "route provider returned status {status}: {message}",
        /// The body could not be decoded.
        Decode { message: String } => "route provider response decode failed: {message}",
        /// The routing service found no path between the points.
        NoRoute => "route provider found no route",
    }
}

/// Port for computing the route a trip would take.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Route from `pickup` to `destination`.
    async fn route(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, RouteProviderError>;
}

/// Straight two-point route with fixed distance and duration.
#[derive(Debug, Clone, Copy)]
pub struct FixtureRouteProvider {
    pub distance: f64,
    pub duration: f64,
}

impl Default for FixtureRouteProvider {
    fn default() -> Self {
        Self {
            distance: 10.0,
            duration: 5.0,
        }
    }
}

#[async_trait]
impl RouteProvider for FixtureRouteProvider {
    async fn route(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, RouteProviderError> {
        Ok(Route {
            polyline: vec![pickup, destination],
            distance: self.distance,
            duration: self.duration,
        })
    }
}
