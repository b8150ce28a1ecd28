//! Consumer loops over AMQP queues.
//!
//! Each consumer gets its own channel with prefetch 1, so the server hands
//! out the next delivery only after the previous one is settled. The shutdown
//! token is only observed while waiting, never while a handler is running.

use std::sync::Arc;

use futures_util::StreamExt;
use lapin::Consumer;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{AmqpBroker, AmqpError, delivery_mode_from};
use crate::domain::BrokerMessage;
use crate::domain::ports::MessageHandler;

impl AmqpBroker {
    /// Start consuming `queue` and feed every delivery to `handler`.
    ///
    /// `Ok` from the handler acks the delivery; `Err` nacks it without
    /// requeue, which dead-letters it when the queue has a dead-letter
    /// route. The task ends when `shutdown` is cancelled or the connection
    /// closes.
    ///
    /// # Errors
    ///
    /// [`AmqpError::Operation`] when the channel, prefetch, or consumer
    /// cannot be set up.
    pub async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, AmqpError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(AmqpError::operation("open consumer channel"))?;
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(AmqpError::operation("basic qos"))?;
        let consumer = channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(AmqpError::operation("basic consume"))?;

        let span = info_span!("consumer", queue = %queue);
        Ok(tokio::spawn(
            consume(consumer, handler, shutdown).instrument(span),
        ))
    }
}

async fn consume(
    mut consumer: Consumer,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
) {
    info!("consumer started");
    loop {
        let delivery = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = consumer.next() => match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(err)) => {
                    warn!(error = %err, "consumer cannot read from queue");
                    break;
                }
                None => break,
            },
        };
        let message = broker_message(&delivery);
        let outcome = handler.handle(&message).await;
        if let Err(err) = &outcome {
            warn!(routing_key = %message.routing_key, error = %err, "handler failed");
        }
        settle(&delivery, outcome.is_ok()).await;
    }
    info!("consumer stopped");
}

async fn settle(delivery: &Delivery, handled: bool) {
    let routing_key = delivery.routing_key.as_str();
    let tag = delivery.delivery_tag;
    if handled {
        match delivery.acker.ack(BasicAckOptions::default()).await {
            Ok(()) => debug!(%routing_key, delivery_tag = tag, "message acknowledged"),
            Err(err) => warn!(%routing_key, delivery_tag = tag, error = %err, "ack failed"),
        }
        return;
    }

    let options = BasicNackOptions {
        requeue: false,
        ..BasicNackOptions::default()
    };
    match delivery.acker.nack(options).await {
        Ok(()) => warn!(%routing_key, delivery_tag = tag, "message rejected"),
        Err(err) => warn!(%routing_key, delivery_tag = tag, error = %err, "nack failed"),
    }
}

fn broker_message(delivery: &Delivery) -> BrokerMessage {
    BrokerMessage {
        routing_key: delivery.routing_key.as_str().to_owned(),
        payload: delivery.data.clone(),
        delivery_mode: delivery_mode_from(*delivery.properties.delivery_mode()),
    }
}
