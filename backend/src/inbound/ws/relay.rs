//! Broker consumers that push trip notifications to relay sessions.
//!
//! A recipient without a live session is logged and the delivery acked; the
//! notification is not retried.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::hub::{ConnectionHub, PushError};
use crate::domain::ports::{HandlerError, MessageHandler};
use crate::domain::{BrokerMessage, DriverTripRequestData, EventEnvelope, RelayFrame, routing_keys};

fn decode(message: &BrokerMessage) -> Result<(EventEnvelope, DriverTripRequestData), HandlerError> {
    let envelope = message
        .envelope()
        .map_err(|err| HandlerError::decode(err.to_string()))?;
    let data = envelope
        .decode()
        .map_err(|err| HandlerError::decode(err.to_string()))?;
    Ok((envelope, data))
}

async fn push(
    hub: &ConnectionHub,
    subject: &str,
    kind: &str,
    data: &DriverTripRequestData,
) -> Result<(), HandlerError> {
    let frame = RelayFrame::new(kind, data).map_err(|err| HandlerError::rejected(err.to_string()))?;
    match hub.push(subject, frame).await {
        Ok(()) => {
            info!(subject, kind, trip_id = %data.trip.id, "relayed frame");
            Ok(())
        }
        Err(PushError::NotConnected { .. }) => {
            warn!(subject, kind, trip_id = %data.trip.id, "recipient not connected; dropping frame");
            Ok(())
        }
    }
}

/// Pushes `driver.cmd.trip_request` to the first candidate driver.
pub struct DriverTripRequestRelay {
    drivers: Arc<ConnectionHub>,
}

impl DriverTripRequestRelay {
    /// Relay trip requests to sessions attached on `drivers`.
    pub fn new(drivers: Arc<ConnectionHub>) -> Self {
        Self { drivers }
    }
}

#[async_trait]
impl MessageHandler for DriverTripRequestRelay {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        let (_, data) = decode(message)?;
        let Some(driver_id) = data.candidate_driver_ids.first() else {
            warn!(trip_id = %data.trip.id, "trip request without candidates");
            return Ok(());
        };
        push(
            &self.drivers,
            driver_id.as_ref(),
            routing_keys::DRIVER_TRIP_REQUEST,
            &data,
        )
        .await
    }
}

/// Pushes `trip.event.no_drivers_found` to the rider owning the trip.
pub struct RiderNoDriversRelay {
    riders: Arc<ConnectionHub>,
}

impl RiderNoDriversRelay {
    /// Relay no-driver notices to sessions attached on `riders`.
    pub fn new(riders: Arc<ConnectionHub>) -> Self {
        Self { riders }
    }
}

#[async_trait]
impl MessageHandler for RiderNoDriversRelay {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        let (envelope, data) = decode(message)?;
        push(
            &self.riders,
            &envelope.owner_id,
            routing_keys::TRIP_NO_DRIVERS_FOUND,
            &data,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::{DriverId, PackageSlug, RideFare, RideFareId, Trip, UserId};

    #[fixture]
    fn hub() -> Arc<ConnectionHub> {
        Arc::new(ConnectionHub::new())
    }

    fn request(candidates: &[&str]) -> DriverTripRequestData {
        DriverTripRequestData {
            trip: Trip::pending(RideFare {
                id: RideFareId::random(),
                user_id: UserId::new("rider-1").expect("valid id"),
                package_slug: PackageSlug::Suv,
                total_price_cents: 216.0,
                route: None,
            }),
            candidate_driver_ids: candidates
                .iter()
                .map(|id| DriverId::new(*id).expect("valid id"))
                .collect(),
        }
    }

    fn message(key: &str, data: &DriverTripRequestData) -> BrokerMessage {
        let envelope = EventEnvelope::new("rider-1", data).expect("payload serialises");
        BrokerMessage::persistent(key, &envelope).expect("envelope serialises")
    }

    #[rstest]
    #[tokio::test]
    async fn trip_request_goes_to_first_candidate_only(hub: Arc<ConnectionHub>) {
        let (_first, mut first_rx) = hub.try_attach("d1").expect("free");
        let (_second, mut second_rx) = hub.try_attach("d2").expect("free");
        let data = request(&["d1", "d2"]);

        DriverTripRequestRelay::new(Arc::clone(&hub))
            .handle(&message(routing_keys::DRIVER_TRIP_REQUEST, &data))
            .await
            .expect("relay succeeds");

        let frame = first_rx.recv().await.expect("frame pushed");
        assert_eq!(frame.kind, routing_keys::DRIVER_TRIP_REQUEST);
        let pushed: DriverTripRequestData =
            serde_json::from_value(frame.data).expect("frame data decodes");
        assert_eq!(pushed, data);
        assert!(second_rx.try_recv().is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn offline_driver_is_not_an_error(hub: Arc<ConnectionHub>) {
        let data = request(&["gone"]);
        DriverTripRequestRelay::new(hub)
            .handle(&message(routing_keys::DRIVER_TRIP_REQUEST, &data))
            .await
            .expect("missing recipient is acked");
    }

    #[rstest]
    #[tokio::test]
    async fn no_drivers_notice_goes_to_owner(hub: Arc<ConnectionHub>) {
        let (_rider, mut rx) = hub.try_attach("rider-1").expect("free");
        let data = request(&[]);

        RiderNoDriversRelay::new(Arc::clone(&hub))
            .handle(&message(routing_keys::TRIP_NO_DRIVERS_FOUND, &data))
            .await
            .expect("relay succeeds");

        let frame = rx.recv().await.expect("frame pushed");
        assert_eq!(frame.kind, routing_keys::TRIP_NO_DRIVERS_FOUND);
    }

    #[rstest]
    #[tokio::test]
    async fn undecodable_body_is_rejected(hub: Arc<ConnectionHub>) {
        let message = BrokerMessage {
            routing_key: routing_keys::TRIP_NO_DRIVERS_FOUND.to_owned(),
            payload: b"not json".to_vec(),
            delivery_mode: Default::default(),
        };
        let err = RiderNoDriversRelay::new(hub)
            .handle(&message)
            .await
            .expect_err("decode fails");
        assert!(matches!(err, HandlerError::Decode { .. }));
    }
}
