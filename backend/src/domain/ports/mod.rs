//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod driver_directory;
mod event_publisher;
mod message_handler;
mod route_provider;
mod trip_lifecycle;
mod trip_repository;

#[cfg(test)]
pub use driver_directory::MockDriverDirectory;
pub use driver_directory::DriverDirectory;
#[cfg(test)]
pub use event_publisher::MockEventPublisher;
pub use event_publisher::{EventPublisher, EventPublisherError};
#[cfg(test)]
pub use message_handler::MockMessageHandler;
pub use message_handler::{HandlerError, MessageHandler};
#[cfg(test)]
pub use route_provider::MockRouteProvider;
pub use route_provider::{FixtureRouteProvider, RouteProvider, RouteProviderError};
#[cfg(test)]
pub use trip_lifecycle::MockTripLifecycle;
pub use trip_lifecycle::{
    CreateTripRequest, CreatedTrip, PreviewTripRequest, TripLifecycle, TripPreview,
};
#[cfg(test)]
pub use trip_repository::MockTripRepository;
pub use trip_repository::{TripRepository, TripRepositoryError};
