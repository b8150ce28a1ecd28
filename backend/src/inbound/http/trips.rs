//! Trip API handlers.
//!
//! ```text
//! POST /trip/preview {"userId":"rider-1","pickup":{..},"destination":{..}}
//! POST /trip/start   {"userId":"rider-1","rideFareId":"3fa85f64-..."}
//! ```
//!
//! Both answer `201 Created` with the result wrapped in `{"data": ...}`.

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DomainError;
use crate::domain::ports::{CreateTripRequest, CreatedTrip, PreviewTripRequest, TripPreview};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Success body for `POST /trip/preview`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TripPreviewResponse {
    /// Route and one fare per tier.
    pub data: TripPreview,
}

/// Success body for `POST /trip/start`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TripStartResponse {
    /// Id of the trip that was created.
    pub data: CreatedTrip,
}

/// Quote every tier between two points.
#[utoipa::path(
    post,
    path = "/trip/preview",
    request_body = PreviewTripRequest,
    responses(
        (status = 201, description = "Route and one fare per tier", body = TripPreviewResponse),
        (status = 400, description = "Invalid request", body = DomainError),
        (status = 503, description = "Routing or storage unavailable", body = DomainError),
        (status = 500, description = "Internal server error", body = DomainError)
    ),
    tags = ["trips"],
    operation_id = "previewTrip"
)]
/// Quote every tier for a route and store the fares.
#[post("/trip/preview")]
pub async fn preview_trip(
    state: web::Data<HttpState>,
    payload: web::Json<PreviewTripRequest>,
) -> ApiResult<HttpResponse> {
    let preview = state.trips.preview_trip(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(TripPreviewResponse { data: preview }))
}

/// Start a trip on a previously quoted fare.
#[utoipa::path(
    post,
    path = "/trip/start",
    request_body = CreateTripRequest,
    responses(
        (status = 201, description = "Trip created", body = TripStartResponse),
        (status = 400, description = "Invalid request", body = DomainError),
        (status = 403, description = "Fare belongs to another user", body = DomainError),
        (status = 404, description = "Unknown fare", body = DomainError),
        (status = 503, description = "Storage or broker unavailable", body = DomainError),
        (status = 500, description = "Internal server error", body = DomainError)
    ),
    tags = ["trips"],
    operation_id = "startTrip"
)]
/// Create a trip from a previously quoted fare.
#[post("/trip/start")]
pub async fn start_trip(
    state: web::Data<HttpState>,
    payload: web::Json<CreateTripRequest>,
) -> ApiResult<HttpResponse> {
    let created = state.trips.create_trip(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(TripStartResponse { data: created }))
}
