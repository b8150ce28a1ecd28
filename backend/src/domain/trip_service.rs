//! Trip lifecycle service: fare previews and trip creation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::ports::{
    CreateTripRequest, CreatedTrip, EventPublisher, EventPublisherError, PreviewTripRequest,
    RouteProvider, RouteProviderError, TripLifecycle, TripPreview, TripRepository,
    TripRepositoryError,
};
use crate::domain::{
    DomainError, EventEnvelope, PackageSlug, PricingConfig, RideFare, RideFareId, Trip,
    TripEventData, estimate_price, round_cents, routing_keys,
};

fn map_repository_error(error: TripRepositoryError) -> DomainError {
    match error {
        TripRepositoryError::Connection { message } => {
            DomainError::upstream_unavailable(format!("trip repository unavailable: {message}"))
        }
        TripRepositoryError::Conflict { message } => {
            DomainError::internal(format!("trip repository conflict: {message}"))
        }
    }
}

fn map_route_error(error: RouteProviderError) -> DomainError {
    match error {
        RouteProviderError::NoRoute => {
            DomainError::invalid_request("no route exists between pickup and destination")
        }
        other => DomainError::upstream_unavailable(format!("route provider unavailable: {other}")),
    }
}

fn map_publish_error(error: EventPublisherError) -> DomainError {
    match error {
        EventPublisherError::ChannelClosed => {
            DomainError::upstream_unavailable("message broker is unavailable")
        }
        EventPublisherError::Encode { message } => {
            DomainError::internal(format!("failed to encode trip event: {message}"))
        }
        EventPublisherError::Rejected { message } => {
            DomainError::upstream_unavailable(format!(
                "message broker rejected trip event: {message}"
            ))
        }
    }
}

/// Service implementing [`TripLifecycle`] over a route provider, a
/// repository, and the event publisher.
pub struct TripService<P: ?Sized, R: ?Sized, E: ?Sized> {
    routes: Arc<P>,
    repository: Arc<R>,
    publisher: Arc<E>,
    pricing: PricingConfig,
}

impl<P: ?Sized, R: ?Sized, E: ?Sized> TripService<P, R, E> {
    /// Create a service with the default pricing rates.
    pub fn new(routes: Arc<P>, repository: Arc<R>, publisher: Arc<E>) -> Self {
        Self {
            routes,
            repository,
            publisher,
            pricing: PricingConfig::default(),
        }
    }

    /// Override the per-unit pricing rates.
    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }
}

#[async_trait]
impl<P, R, E> TripLifecycle for TripService<P, R, E>
where
    P: RouteProvider + ?Sized,
    R: TripRepository + ?Sized,
    E: EventPublisher + ?Sized,
{
    async fn preview_trip(&self, request: PreviewTripRequest) -> Result<TripPreview, DomainError> {
        for (field, point) in [
            ("pickup", &request.pickup),
            ("destination", &request.destination),
        ] {
            point.validate().map_err(|err| {
                DomainError::invalid_request(err.to_string())
                    .with_details(json!({ "field": field }))
            })?;
        }

        let route = self
            .routes
            .route(request.pickup, request.destination)
            .await
            .map_err(map_route_error)?;

        let mut ride_fares = Vec::with_capacity(PackageSlug::ALL.len());
        for package_slug in PackageSlug::ALL {
            let fare = RideFare {
                id: RideFareId::random(),
                user_id: request.user_id.clone(),
                package_slug,
                total_price_cents: round_cents(estimate_price(
                    package_slug,
                    &route,
                    &self.pricing,
                )),
                route: Some(route.clone()),
            };
            self.repository
                .save_ride_fare(&fare)
                .await
                .map_err(map_repository_error)?;
            ride_fares.push(fare);
        }

        info!(
            user_id = %request.user_id,
            distance = route.distance,
            duration = route.duration,
            fares = ride_fares.len(),
            "trip preview quoted"
        );
        Ok(TripPreview { route, ride_fares })
    }

    async fn create_trip(&self, request: CreateTripRequest) -> Result<CreatedTrip, DomainError> {
        let fare = self
            .repository
            .get_ride_fare(&request.ride_fare_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| DomainError::not_found("fare not found"))?;

        if fare.user_id != request.user_id {
            warn!(
                user_id = %request.user_id,
                ride_fare_id = %request.ride_fare_id,
                "fare ownership mismatch"
            );
            return Err(DomainError::permission_denied("fare does not belong to the user"));
        }

        let trip = Trip::pending(fare);
        self.repository
            .create_trip(&trip)
            .await
            .map_err(map_repository_error)?;

        let envelope = EventEnvelope::new(
            trip.user_id.to_string(),
            &TripEventData { trip: trip.clone() },
        )
        .map_err(|err| DomainError::internal(format!("failed to encode trip event: {err}")))?;
        self.publisher
            .publish(routing_keys::TRIP_CREATED, &envelope)
            .await
            .map_err(map_publish_error)?;

        info!(trip_id = %trip.id, user_id = %trip.user_id, "trip created");
        Ok(CreatedTrip { trip_id: trip.id })
    }
}
