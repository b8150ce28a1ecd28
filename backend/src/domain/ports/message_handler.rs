//! Port implemented by broker consumers.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::BrokerMessage;

define_port_error! {
    /// Failure of a handler; the delivery is negatively acknowledged.
    pub enum HandlerError {
        /// The body was not the expected event.
        Decode { message: String } => "message decode failed: {message}",
        /// A follow-up publish failed.
        Publish { message: String } => "follow-up publish failed: {message}",
        /// The handler refused the message for another reason.
        Rejected { message: String } => "message rejected: {message}",
    }
}

/// Processes one delivery at a time.
///
/// Returning `Ok` acknowledges the delivery; returning `Err` rejects it
/// without requeueing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError>;
}
