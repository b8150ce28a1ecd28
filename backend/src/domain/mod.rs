//! Domain primitives, aggregates, and services.
//!
//! Purpose: define the dispatch model (fares, trips, drivers, broker events)
//! and the services that drive it. Everything here is transport agnostic;
//! adapters reach the domain through the traits in [`ports`].
//!
//! Public surface:
//! - DomainError / ErrorCode: closed error taxonomy returned by use-cases.
//! - Coordinate / Route / geohash: geographic primitives.
//! - PackageSlug / RideFare / pricing helpers.
//! - Trip and its identifiers.
//! - Driver, profile generation, and the in-memory [`DriverRegistry`].
//! - Broker event payloads and routing constants.
//! - [`TripService`] and [`TripEventConsumer`].

mod driver;
mod driver_registry;
pub mod error;
mod events;
mod fare;
mod geo;
mod identity;
pub mod ports;
mod trip;
mod trip_consumer;
mod trip_service;

pub use self::driver::{
    DEFAULT_DRIVER_NAME, Driver, DriverProfile, DriverProfileGenerator, START_POINTS,
    SeededProfileGenerator, avatar_url,
};
pub use self::driver_registry::DriverRegistry;
pub use self::error::{DomainError, DomainErrorValidationError, ErrorCode};
pub use self::events::{
    BrokerMessage, DeliveryMode, DriverTripRequestData, EventEnvelope, RelayFrame, TRIP_EXCHANGE,
    TripEventData, frame_types, queues, routing_keys,
};
pub use self::fare::{
    PackageSlug, PricingConfig, RideFare, UnknownPackageSlug, base_price, estimate_price,
    round_cents,
};
pub use self::geo::{
    Coordinate, CoordinateValidationError, DRIVER_GEOHASH_PRECISION, Route, geohash,
};
pub use self::identity::{DriverId, SUBJECT_ID_MAX, SubjectIdValidationError, UserId};
pub use self::trip::{RideFareId, Trip, TripDriver, TripId, TripStatus};
pub use self::trip_consumer::TripEventConsumer;
pub use self::trip_service::TripService;
