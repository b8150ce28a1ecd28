//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::TripLifecycle;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Trip use-cases behind the REST handlers.
    pub trips: Arc<dyn TripLifecycle>,
}

impl HttpState {
    /// Wrap the trip use-cases for handler injection.
    pub fn new(trips: Arc<dyn TripLifecycle>) -> Self {
        Self { trips }
    }
}
