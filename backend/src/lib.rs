//! Ride dispatch backend: fare previews, trip creation, driver matching, and
//! the real-time relay for drivers and riders.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod settings;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
