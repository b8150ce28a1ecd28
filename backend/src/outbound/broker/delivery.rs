//! A message handed to a consumer, settled exactly once.
//!
//! `ack` and `nack` consume the delivery. A delivery dropped without either
//! (for example because its consumer task was aborted) goes back to the head
//! of its queue flagged as redelivered.

use std::sync::Arc;

use super::BrokerInner;
use crate::domain::BrokerMessage;

/// One in-flight message.
#[derive(Debug)]
pub struct Delivery {
    message: BrokerMessage,
    queue: String,
    delivery_tag: u64,
    redelivered: bool,
    settled: bool,
    broker: Arc<BrokerInner>,
}

impl Delivery {
    pub(super) fn new(
        broker: Arc<BrokerInner>,
        queue: String,
        delivery_tag: u64,
        message: BrokerMessage,
        redelivered: bool,
    ) -> Self {
        Self {
            message,
            queue,
            delivery_tag,
            redelivered,
            settled: false,
            broker,
        }
    }

    /// The delivered message.
    pub fn message(&self) -> &BrokerMessage {
        &self.message
    }

    /// Queue the message was taken from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Broker-assigned tag, unique for the broker's lifetime.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Whether this message was handed out before and not settled.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Acknowledge successful processing.
    pub fn ack(mut self) {
        self.settled = true;
        self.broker.ack(&self.queue);
    }

    /// Reject without requeue. The message moves to the queue's dead-letter
    /// queue when one is configured and is discarded otherwise.
    pub fn nack(mut self) {
        self.settled = true;
        let message = std::mem::take(&mut self.message);
        self.broker.nack(&self.queue, message);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let message = std::mem::take(&mut self.message);
        self.broker.requeue(&self.queue, message);
    }
}
