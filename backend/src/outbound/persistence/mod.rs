//! Persistence adapters.
//!
//! Repository implementations only translate between storage and domain
//! types; no business logic resides here.

mod in_memory_trip_repository;

pub use in_memory_trip_repository::InMemoryTripRepository;
