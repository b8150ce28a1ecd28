//! Runtime settings loaded via OrthoConfig.
//!
//! Every value can come from the command line, a `DISPATCH_*` environment
//! variable, or a config file; unset values fall back to the defaults below.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::PricingConfig;
use crate::inbound::ws::state::Heartbeat;
use crate::outbound::osrm::DEFAULT_OSRM_BASE_URL;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// A setting that was present but could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The bind address is not a socket address.
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        /// Raw configured value.
        value: String,
        /// Parser failure.
        #[source]
        source: std::net::AddrParseError,
    },
    /// The OSRM base URL does not parse.
    #[error("invalid OSRM base URL {value:?}: {source}")]
    OsrmBaseUrl {
        /// Raw configured value.
        value: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// The heartbeat interval cannot detect an idle client.
    #[error("heartbeat interval must be shorter than the client timeout")]
    Heartbeat,
}

/// Configuration for the dispatch server.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DISPATCH")]
pub struct DispatchSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// Base URL of the OSRM routing service.
    pub osrm_base_url: Option<String>,
    /// Per-request OSRM timeout in seconds.
    #[ortho_config(default = 10)]
    pub osrm_timeout_secs: u64,
    /// AMQP broker URI; the in-process broker is used when unset.
    pub amqp_uri: Option<String>,
    /// Seed for driver profile generation; random when unset.
    pub registry_seed: Option<u64>,
    /// Seconds between relay pings.
    pub heartbeat_interval_secs: Option<u64>,
    /// Seconds without client traffic before a relay session is closed.
    pub client_timeout_secs: Option<u64>,
    /// Price per metre of route distance.
    pub price_per_distance_unit: Option<f64>,
    /// Price per second of route duration.
    pub price_per_time_unit: Option<f64>,
}

impl DispatchSettings {
    /// Return the bind address, falling back to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value.parse().map_err(|source| SettingsError::BindAddr {
            value: value.to_owned(),
            source,
        })
    }

    /// Return the OSRM base URL, falling back to the public demo server.
    pub fn osrm_base_url(&self) -> Result<Url, SettingsError> {
        let value = self.osrm_base_url.as_deref().unwrap_or(DEFAULT_OSRM_BASE_URL);
        Url::parse(value).map_err(|source| SettingsError::OsrmBaseUrl {
            value: value.to_owned(),
            source,
        })
    }

    /// Return the per-request OSRM timeout.
    pub fn osrm_timeout(&self) -> Duration {
        Duration::from_secs(self.osrm_timeout_secs)
    }

    /// Return the AMQP broker URI when one is configured.
    pub fn amqp_uri(&self) -> Option<&str> {
        self.amqp_uri.as_deref().filter(|uri| !uri.trim().is_empty())
    }

    /// Relay heartbeat, rejecting an interval that cannot detect idleness.
    pub fn heartbeat(&self) -> Result<Heartbeat, SettingsError> {
        let defaults = Heartbeat::default();
        let heartbeat = Heartbeat {
            interval: self
                .heartbeat_interval_secs
                .map_or(defaults.interval, Duration::from_secs),
            client_timeout: self
                .client_timeout_secs
                .map_or(defaults.client_timeout, Duration::from_secs),
        };
        if heartbeat.interval.is_zero() || heartbeat.interval >= heartbeat.client_timeout {
            return Err(SettingsError::Heartbeat);
        }
        Ok(heartbeat)
    }

    /// Fare multipliers, falling back to the default package pricing.
    pub fn pricing(&self) -> PricingConfig {
        let defaults = PricingConfig::default();
        PricingConfig {
            price_per_distance_unit: self
                .price_per_distance_unit
                .unwrap_or(defaults.price_per_distance_unit),
            price_per_time_unit: self
                .price_per_time_unit
                .unwrap_or(defaults.price_per_time_unit),
        }
    }
}
