//! OSRM outbound adapter.
//!
//! A thin HTTP implementation of the `RouteProvider` port backed by the OSRM
//! route service.

mod dto;
mod http_source;

pub use http_source::{DEFAULT_OSRM_BASE_URL, OsrmRouteProvider};
