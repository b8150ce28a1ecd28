//! Process-memory trip repository.
//!
//! Fares and trips live in hash maps behind a `RwLock`. Lost on restart, which
//! is acceptable because drivers and relay sessions are too.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::ports::{TripRepository, TripRepositoryError};
use crate::domain::{RideFare, RideFareId, Trip, TripId};

#[derive(Debug, Default)]
struct Tables {
    fares: HashMap<RideFareId, RideFare>,
    trips: HashMap<TripId, Trip>,
}

/// [`TripRepository`] holding everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryTripRepository {
    tables: RwLock<Tables>,
}

impl InMemoryTripRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored trip.
    pub fn trip(&self, id: &TripId) -> Option<Trip> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .trips
            .get(id)
            .cloned()
    }

    /// Number of stored trips.
    pub fn trip_count(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .trips
            .len()
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn save_ride_fare(&self, fare: &RideFare) -> Result<(), TripRepositoryError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.fares.contains_key(&fare.id) {
            return Err(TripRepositoryError::conflict(format!(
                "ride fare {} already exists",
                fare.id
            )));
        }
        tables.fares.insert(fare.id, fare.clone());
        Ok(())
    }

    async fn get_ride_fare(
        &self,
        id: &RideFareId,
    ) -> Result<Option<RideFare>, TripRepositoryError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.fares.get(id).cloned())
    }

    async fn create_trip(&self, trip: &Trip) -> Result<(), TripRepositoryError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.trips.contains_key(&trip.id) {
            return Err(TripRepositoryError::conflict(format!(
                "trip {} already exists",
                trip.id
            )));
        }
        tables.trips.insert(trip.id, trip.clone());
        Ok(())
    }
}
