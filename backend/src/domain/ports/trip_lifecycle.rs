//! Driving port for quoting fares and starting trips.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Coordinate, DomainError, RideFare, RideFareId, Route, TripId, UserId};

/// Request to quote every tier between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTripRequest {
    pub user_id: UserId,
    pub pickup: Coordinate,
    pub destination: Coordinate,
}

/// The route plus one saved fare per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripPreview {
    pub route: Route,
    pub ride_fares: Vec<RideFare>,
}

/// Request to start a trip on a previously quoted fare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub user_id: UserId,
    pub ride_fare_id: RideFareId,
}

/// Result of starting a trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTrip {
    pub trip_id: TripId,
}

/// Trip lifecycle use-cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripLifecycle: Send + Sync {
    /// Route the trip and persist one fare per tier.
    ///
    /// Fails with `UpstreamUnavailable` when routing or persistence is down
    /// and `InvalidRequest` for out-of-range coordinates.
    async fn preview_trip(&self, request: PreviewTripRequest) -> Result<TripPreview, DomainError>;

    /// Open a pending trip on the caller's fare and announce it.
    ///
    /// Fails with `NotFound` for an unknown fare and `PermissionDenied` when
    /// the fare belongs to someone else; nothing is persisted in either case.
    async fn create_trip(&self, request: CreateTripRequest) -> Result<CreatedTrip, DomainError>;
}
