//! OpenAPI documentation for the trip REST API.
//!
//! The generated document is served by Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::domain::ports::{CreateTripRequest, CreatedTrip, PreviewTripRequest, TripPreview};
use crate::domain::{DomainError, ErrorCode};
use crate::inbound::http::trips::{TripPreviewResponse, TripStartResponse};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ride dispatch API",
        description = "Fare previews, trip creation, and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::trips::preview_trip,
        crate::inbound::http::trips::start_trip,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        DomainError,
        ErrorCode,
        PreviewTripRequest,
        TripPreview,
        TripPreviewResponse,
        CreateTripRequest,
        CreatedTrip,
        TripStartResponse
    )),
    tags(
        (name = "trips", description = "Fare previews and trip creation"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
/// OpenAPI document for the REST endpoints and their schemas.
pub struct ApiDoc;
