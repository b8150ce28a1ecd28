//! Long-lived consumer tasks.
//!
//! A consumer takes one delivery, runs the handler to completion, settles it,
//! then takes the next (prefetch 1). The shutdown token is only observed
//! while waiting for a delivery, never while a handler is running.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{Broker, BrokerError};
use crate::domain::ports::MessageHandler;

impl Broker {
    /// Spawn a consumer for `queue` that feeds every delivery to `handler`.
    ///
    /// `Ok` from the handler acks the delivery; `Err` nacks it without
    /// requeue. The task ends when `shutdown` is cancelled or the broker is
    /// closed.
    ///
    /// # Errors
    ///
    /// [`BrokerError::UnknownQueue`] when `queue` is not declared.
    pub fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, BrokerError> {
        if self.queue_stats(queue).is_none() {
            return Err(BrokerError::UnknownQueue {
                queue: queue.to_owned(),
            });
        }
        let broker = self.clone();
        let queue = queue.to_owned();
        let span = info_span!("consumer", queue = %queue);
        Ok(tokio::spawn(
            consume(broker, queue, handler, shutdown).instrument(span),
        ))
    }
}

async fn consume(
    broker: Broker,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) {
    info!("consumer started");
    loop {
        let delivery = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = broker.next_delivery(&queue) => match next {
                Ok(delivery) => delivery,
                Err(BrokerError::ChannelClosed) => break,
                Err(err) => {
                    warn!(error = %err, "consumer cannot read from queue");
                    break;
                }
            },
        };

        let routing_key = delivery.message().routing_key.clone();
        let tag = delivery.delivery_tag();
        match handler.handle(delivery.message()).await {
            Ok(()) => {
                delivery.ack();
                debug!(%routing_key, delivery_tag = tag, "message acknowledged");
            }
            Err(err) => {
                delivery.nack();
                warn!(%routing_key, delivery_tag = tag, error = %err, "message rejected");
            }
        }
    }
    info!("consumer stopped");
}
