//! Broker routing keys, queue names, and event payloads.
//!
//! Every broker body is a JSON [`EventEnvelope`] `{ "ownerId", "data" }`.
//! Relay frames use the same `type` strings as routing keys so a client can
//! match pushes to the events that caused them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::identity::DriverId;
use super::trip::Trip;

/// Topic exchange all trip traffic flows through.
pub const TRIP_EXCHANGE: &str = "trip";

/// Routing keys published by the services.
pub mod routing_keys {
    /// A rider created a trip.
    pub const TRIP_CREATED: &str = "trip.event.created";
    /// A driver declined a trip request.
    pub const TRIP_DRIVER_NOT_INTERESTED: &str = "trip.event.driver_not_interested";
    /// No driver was online for the trip's tier.
    pub const TRIP_NO_DRIVERS_FOUND: &str = "trip.event.no_drivers_found";
    /// Offer a trip to a candidate driver.
    pub const DRIVER_TRIP_REQUEST: &str = "driver.cmd.trip_request";
}

/// Durable queues declared by the default topology.
pub mod queues {
    /// Created and declined trips awaiting a match.
    pub const FIND_AVAILABLE_DRIVERS: &str = "find_available_drivers";
    /// Matching messages rejected by their handler.
    pub const FIND_AVAILABLE_DRIVERS_DEAD_LETTER: &str = "find_available_drivers.dead_letter";
    /// Trip requests relayed to driver sessions.
    pub const DRIVER_CMD_TRIP_REQUEST: &str = "driver_cmd_trip_request";
    /// No-driver notices relayed to rider sessions.
    pub const NOTIFY_RIDER_NO_DRIVERS_FOUND: &str = "notify_rider_no_drivers_found";
}

/// Relay frame types that are not broker routing keys.
pub mod frame_types {
    /// Sent to a driver once its session is registered.
    pub const DRIVER_REGISTER: &str = "driver.cmd.register";
}

/// Broker body wrapper naming the subject the event concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Subject the event is addressed to.
    pub owner_id: String,
    pub data: Value,
}

impl EventEnvelope {
    /// Wrap a serialisable payload.
    pub fn new<T: Serialize>(owner_id: impl Into<String>, data: &T) -> serde_json::Result<Self> {
        Ok(Self {
            owner_id: owner_id.into(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Decode the payload into a concrete event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.data)
    }
}

/// Payload of `trip.event.*` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripEventData {
    pub trip: Trip,
}

/// Payload of `driver.cmd.trip_request` and `trip.event.no_drivers_found`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriverTripRequestData {
    pub trip: Trip,
    pub candidate_driver_ids: Vec<DriverId>,
}

/// Whether the broker keeps a message across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    Transient,
    #[default]
    Persistent,
}

/// A message as it travels through the broker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrokerMessage {
    pub routing_key: String,
    /// JSON-encoded [`EventEnvelope`].
    pub payload: Vec<u8>,
    pub delivery_mode: DeliveryMode,
}

impl BrokerMessage {
    /// Encode `envelope` as a persistent message.
    pub fn persistent(
        routing_key: impl Into<String>,
        envelope: &EventEnvelope,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            routing_key: routing_key.into(),
            payload: serde_json::to_vec(envelope)?,
            delivery_mode: DeliveryMode::Persistent,
        })
    }

    /// Decode the payload as an [`EventEnvelope`].
    pub fn envelope(&self) -> serde_json::Result<EventEnvelope> {
        serde_json::from_slice(&self.payload)
    }
}

/// `{type, data}` frame exchanged with relay clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl RelayFrame {
    /// Build a frame from a serialisable payload.
    pub fn new<T: Serialize>(kind: impl Into<String>, data: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind: kind.into(),
            data: serde_json::to_value(data)?,
        })
    }
}
