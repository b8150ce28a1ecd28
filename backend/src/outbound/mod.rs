//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **amqp**: `lapin` adapter for a real AMQP broker, used when an AMQP URI
//!   is configured
//! - **broker**: in-process topic broker with durable queues, manual
//!   acknowledgement, and dead-lettering
//! - **osrm**: OSRM HTTP client implementing `RouteProvider`
//! - **persistence**: in-memory `TripRepository`
//!
//! Adapters are thin translators between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod amqp;
pub mod broker;
pub mod osrm;
pub mod persistence;
