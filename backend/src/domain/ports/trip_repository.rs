//! Driven port for fare and trip persistence.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{RideFare, RideFareId, Trip};

define_port_error! {
    /// Errors raised by trip repository adapters.
    pub enum TripRepositoryError {
        /// The backing store could not be reached.
        Connection { message: String } => "trip repository connection failed: {message}",
        /// A write collided with an existing record.
        Conflict { message: String } => "trip repository conflict: {message}",
    }
}

/// Storage for quoted fares and created trips.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Persist a freshly quoted fare.
    async fn save_ride_fare(&self, fare: &RideFare) -> Result<(), TripRepositoryError>;

    /// Look up a fare by id; `Ok(None)` when it was never saved.
    async fn get_ride_fare(&self, id: &RideFareId)
    -> Result<Option<RideFare>, TripRepositoryError>;

    /// Persist a new trip.
    async fn create_trip(&self, trip: &Trip) -> Result<(), TripRepositoryError>;
}
