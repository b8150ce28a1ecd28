//! Consumer matching new trips to online drivers.
//!
//! Reads `trip.event.*` deliveries, asks the driver directory for candidates
//! on the trip's tier, and publishes either a trip request to drivers or a
//! no-drivers notice for the rider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::ports::{DriverDirectory, EventPublisher, HandlerError, MessageHandler};
use crate::domain::{BrokerMessage, DriverTripRequestData, EventEnvelope, TripEventData, routing_keys};

/// [`MessageHandler`] for the `find_available_drivers` queue.
pub struct TripEventConsumer<D: ?Sized, E: ?Sized> {
    drivers: Arc<D>,
    publisher: Arc<E>,
}

impl<D: ?Sized, E: ?Sized> TripEventConsumer<D, E> {
    /// Match trips against `drivers` and publish follow-ups through `publisher`.
    pub fn new(drivers: Arc<D>, publisher: Arc<E>) -> Self {
        Self { drivers, publisher }
    }
}

#[async_trait]
impl<D, E> MessageHandler for TripEventConsumer<D, E>
where
    D: DriverDirectory + ?Sized,
    E: EventPublisher + ?Sized,
{
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        let envelope = message
            .envelope()
            .map_err(|err| HandlerError::decode(err.to_string()))?;
        let TripEventData { trip } = envelope
            .decode()
            .map_err(|err| HandlerError::decode(err.to_string()))?;

        let candidates = self.drivers.find_available(trip.fare.package_slug);
        let routing_key = if candidates.is_empty() {
            warn!(
                trip_id = %trip.id,
                package_slug = %trip.fare.package_slug,
                "no drivers available for trip"
            );
            routing_keys::TRIP_NO_DRIVERS_FOUND
        } else {
            info!(
                trip_id = %trip.id,
                package_slug = %trip.fare.package_slug,
                candidates = candidates.len(),
                "dispatching trip request to drivers"
            );
            routing_keys::DRIVER_TRIP_REQUEST
        };

        let outbound = EventEnvelope::new(
            envelope.owner_id,
            &DriverTripRequestData {
                trip,
                candidate_driver_ids: candidates,
            },
        )
        .map_err(|err| HandlerError::publish(err.to_string()))?;

        self.publisher
            .publish(routing_key, &outbound)
            .await
            .map_err(|err| HandlerError::publish(err.to_string()))
    }
}
