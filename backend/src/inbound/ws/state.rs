//! Shared WebSocket adapter state.
//!
//! Relay entry points depend on the driver directory port and the connection
//! hubs rather than on concrete services so tests can swap in doubles.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::hub::ConnectionHub;
use crate::domain::ports::DriverDirectory;

/// Ping cadence and idle limit for relay sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Time between server pings.
    pub interval: Duration,
    /// Silence after which the session is closed.
    pub client_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(10),
        }
    }
}

/// Dependency bundle for relay handlers and sessions.
#[derive(Clone)]
pub struct WsState {
    /// Online driver registry.
    pub drivers: Arc<dyn DriverDirectory>,
    /// Live driver sessions keyed by driver id.
    pub driver_sessions: Arc<ConnectionHub>,
    /// Live rider sessions keyed by user id.
    pub rider_sessions: Arc<ConnectionHub>,
    /// Ping cadence for every session.
    pub heartbeat: Heartbeat,
    /// Cancelled on process shutdown; sessions close when it fires.
    pub shutdown: CancellationToken,
}

impl WsState {
    /// Empty hubs with the default heartbeat.
    pub fn new(drivers: Arc<dyn DriverDirectory>, shutdown: CancellationToken) -> Self {
        Self {
            drivers,
            driver_sessions: Arc::new(ConnectionHub::new()),
            rider_sessions: Arc::new(ConnectionHub::new()),
            heartbeat: Heartbeat::default(),
            shutdown,
        }
    }

    /// Replace the heartbeat cadence.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}
