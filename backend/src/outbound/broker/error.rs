//! Broker failure modes.

/// Errors returned by [`super::Broker`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The broker has been closed; no further publishes or deliveries.
    #[error("broker channel is closed")]
    ChannelClosed,
    /// The payload could not be serialised to JSON.
    #[error("failed to serialise message: {message}")]
    Serialization { message: String },
    /// A redeclaration conflicted with the existing definition.
    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },
    /// The named exchange has not been declared.
    #[error("exchange `{exchange}` is not declared")]
    UnknownExchange { exchange: String },
    /// The named queue has not been declared.
    #[error("queue `{queue}` is not declared")]
    UnknownQueue { queue: String },
}
