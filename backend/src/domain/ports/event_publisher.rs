//! Driven port for publishing events to the broker.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::EventEnvelope;

define_port_error! {
    /// Errors raised while publishing.
    pub enum EventPublisherError {
        /// The broker connection is closed.
        ChannelClosed => "broker channel is closed",
        /// The envelope could not be encoded.
        Encode { message: String } => "event encoding failed: {message}",
        /// The broker refused the publish (for example an undeclared exchange).
        Rejected { message: String } => "broker rejected publish: {message}",
    }
}

/// Publishes envelopes on the trip exchange under a routing key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `envelope` under `routing_key`. No retry is attempted.
    async fn publish(
        &self,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), EventPublisherError>;
}
