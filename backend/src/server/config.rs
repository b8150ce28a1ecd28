//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::time::Duration;

use dispatch_backend::domain::PricingConfig;
use dispatch_backend::inbound::ws::state::Heartbeat;
use dispatch_backend::settings::{DispatchSettings, SettingsError};
use url::Url;

/// Resolved configuration for creating the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) osrm_base_url: Url,
    pub(crate) osrm_timeout: Duration,
    pub(crate) registry_seed: Option<u64>,
    pub(crate) amqp_uri: Option<String>,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) pricing: PricingConfig,
}

impl ServerConfig {
    /// Resolve defaults and validate the loaded settings.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when a configured value does not parse.
    pub fn from_settings(settings: &DispatchSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            osrm_base_url: settings.osrm_base_url()?,
            osrm_timeout: settings.osrm_timeout(),
            registry_seed: settings.registry_seed,
            amqp_uri: settings.amqp_uri().map(str::to_owned),
            heartbeat: settings.heartbeat()?,
            pricing: settings.pricing(),
        })
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
