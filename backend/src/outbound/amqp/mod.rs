//! AMQP 0-9-1 adapter backed by `lapin`.
//!
//! Declares the same [`Topology`] as the in-process broker on a real server:
//! durable topic exchanges, durable queues, and dead-lettering through the
//! default exchange. Publishes are persistent JSON. Consumers run with
//! prefetch 1 and manual acknowledgement; see [`AmqpBroker::subscribe`].

mod consumer;

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info, warn};

use crate::domain::ports::{EventPublisher, EventPublisherError};
use crate::domain::{BrokerMessage, DeliveryMode, EventEnvelope, TRIP_EXCHANGE};
use crate::outbound::broker::{QueueSpec, Topology};

const JSON_CONTENT_TYPE: &str = "application/json";
const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";
const PERSISTENT: u8 = 2;
const TRANSIENT: u8 = 1;

/// Failure talking to the AMQP server.
#[derive(Debug, thiserror::Error)]
pub enum AmqpError {
    /// The connection could not be opened.
    #[error("failed to connect to AMQP broker: {0}")]
    Connect(#[source] lapin::Error),
    /// A declaration, bind, or consumer setup was refused.
    #[error("AMQP {operation} failed: {source}")]
    Operation {
        /// What was being attempted.
        operation: &'static str,
        /// Client failure.
        #[source]
        source: lapin::Error,
    },
}

impl AmqpError {
    fn operation(operation: &'static str) -> impl FnOnce(lapin::Error) -> Self {
        move |source| Self::Operation { operation, source }
    }
}

/// Shared connection plus a publishing channel; clones share both.
#[derive(Clone)]
pub struct AmqpBroker {
    connection: Arc<Connection>,
    channel: Channel,
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("status", &self.connection.status().state())
            .finish_non_exhaustive()
    }
}

impl AmqpBroker {
    /// Connect to `uri` and declare `topology`.
    ///
    /// # Errors
    ///
    /// [`AmqpError::Connect`] when the server is unreachable and
    /// [`AmqpError::Operation`] when a declaration is refused, for example
    /// because a queue already exists with different arguments.
    pub async fn connect(uri: &str, topology: &Topology) -> Result<Self, AmqpError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(AmqpError::Connect)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(AmqpError::operation("open channel"))?;
        let broker = Self {
            connection: Arc::new(connection),
            channel,
        };
        broker.declare(topology).await?;
        info!("connected to AMQP broker");
        Ok(broker)
    }

    /// Declare every exchange, queue, and binding in `topology`.
    ///
    /// # Errors
    ///
    /// [`AmqpError::Operation`] naming the first declaration the server
    /// refused.
    pub async fn declare(&self, topology: &Topology) -> Result<(), AmqpError> {
        for exchange in &topology.exchanges {
            self.channel
                .exchange_declare(
                    &exchange.name,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: exchange.durable,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(AmqpError::operation("exchange declare"))?;
            debug!(exchange = %exchange.name, "exchange declared");
        }
        for queue in &topology.queues {
            self.channel
                .queue_declare(
                    &queue.name,
                    QueueDeclareOptions {
                        durable: queue.durable,
                        ..QueueDeclareOptions::default()
                    },
                    queue_arguments(queue),
                )
                .await
                .map_err(AmqpError::operation("queue declare"))?;
            debug!(queue = %queue.name, "queue declared");
        }
        for binding in &topology.bindings {
            self.channel
                .queue_bind(
                    &binding.queue,
                    &binding.exchange,
                    &binding.pattern,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(AmqpError::operation("queue bind"))?;
            debug!(
                exchange = %binding.exchange,
                queue = %binding.queue,
                pattern = %binding.pattern,
                "queue bound"
            );
        }
        Ok(())
    }

    /// Route an already encoded message through `exchange`.
    ///
    /// # Errors
    ///
    /// Returns the client error when the channel refuses the publish.
    pub async fn publish_message(
        &self,
        exchange: &str,
        message: &BrokerMessage,
    ) -> Result<(), lapin::Error> {
        self.channel
            .basic_publish(
                exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.payload,
                publish_properties(message.delivery_mode),
            )
            .await?
            .await?;
        debug!(exchange, routing_key = %message.routing_key, "message published");
        Ok(())
    }

    /// Close the connection. Consumers see their stream end.
    pub async fn close(&self) {
        if let Err(error) = self.connection.close(200, "shutting down").await {
            warn!(error = %error, "failed to close AMQP connection cleanly");
        }
    }
}

#[async_trait]
impl EventPublisher for AmqpBroker {
    async fn publish(
        &self,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), EventPublisherError> {
        let message = BrokerMessage::persistent(routing_key, envelope)
            .map_err(|err| EventPublisherError::encode(err.to_string()))?;
        self.publish_message(TRIP_EXCHANGE, &message)
            .await
            .map_err(publish_error)
    }
}

/// Queue arguments carrying the dead-letter route, if any.
///
/// Rejected messages go through the default exchange, which routes by queue
/// name.
fn queue_arguments(spec: &QueueSpec) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(dead_letter) = &spec.dead_letter {
        arguments.insert(
            ShortString::from(DEAD_LETTER_EXCHANGE_ARG),
            AMQPValue::LongString(LongString::from(String::new())),
        );
        arguments.insert(
            ShortString::from(DEAD_LETTER_ROUTING_KEY_ARG),
            AMQPValue::LongString(LongString::from(dead_letter.clone())),
        );
    }
    arguments
}

fn publish_properties(mode: DeliveryMode) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
        .with_delivery_mode(delivery_mode_code(mode))
}

fn delivery_mode_code(mode: DeliveryMode) -> u8 {
    match mode {
        DeliveryMode::Persistent => PERSISTENT,
        DeliveryMode::Transient => TRANSIENT,
    }
}

/// Absent or unknown modes are treated as persistent.
fn delivery_mode_from(code: Option<u8>) -> DeliveryMode {
    match code {
        Some(TRANSIENT) => DeliveryMode::Transient,
        _ => DeliveryMode::Persistent,
    }
}

fn publish_error(error: lapin::Error) -> EventPublisherError {
    match error {
        lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
            EventPublisherError::channel_closed()
        }
        other => EventPublisherError::rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use lapin::{ChannelState, ConnectionState};
    use rstest::rstest;

    use super::*;
    use crate::domain::queues;

    fn argument<'a>(table: &'a FieldTable, key: &str) -> Option<&'a AMQPValue> {
        table.inner().get(&ShortString::from(key))
    }

    #[test]
    fn dead_letter_queues_route_through_the_default_exchange() {
        let spec = QueueSpec::durable(queues::FIND_AVAILABLE_DRIVERS)
            .with_dead_letter(queues::FIND_AVAILABLE_DRIVERS_DEAD_LETTER);

        let arguments = queue_arguments(&spec);

        assert_eq!(
            argument(&arguments, DEAD_LETTER_EXCHANGE_ARG),
            Some(&AMQPValue::LongString(LongString::from(String::new())))
        );
        assert_eq!(
            argument(&arguments, DEAD_LETTER_ROUTING_KEY_ARG),
            Some(&AMQPValue::LongString(LongString::from(
                queues::FIND_AVAILABLE_DRIVERS_DEAD_LETTER.to_owned()
            )))
        );
    }

    #[test]
    fn plain_queues_carry_no_arguments() {
        let arguments = queue_arguments(&QueueSpec::durable(queues::DRIVER_CMD_TRIP_REQUEST));
        assert!(arguments.inner().is_empty());
    }

    #[test]
    fn every_dispatch_queue_declares_its_dead_letter_target() {
        let topology = Topology::dispatch();
        for spec in &topology.queues {
            let arguments = queue_arguments(spec);
            assert_eq!(
                argument(&arguments, DEAD_LETTER_ROUTING_KEY_ARG).is_some(),
                spec.dead_letter.is_some(),
                "queue {}",
                spec.name
            );
        }
    }

    #[rstest]
    #[case(DeliveryMode::Persistent, 2)]
    #[case(DeliveryMode::Transient, 1)]
    fn publishes_json_with_the_delivery_mode(#[case] mode: DeliveryMode, #[case] code: u8) {
        let properties = publish_properties(mode);

        assert_eq!(properties.delivery_mode(), &Some(code));
        assert_eq!(
            properties.content_type(),
            &Some(ShortString::from(JSON_CONTENT_TYPE))
        );
        assert_eq!(delivery_mode_from(Some(code)), mode);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0))]
    #[case(Some(9))]
    fn unknown_delivery_modes_read_as_persistent(#[case] code: Option<u8>) {
        assert_eq!(delivery_mode_from(code), DeliveryMode::Persistent);
    }

    #[test]
    fn closed_channels_map_to_channel_closed() {
        assert_eq!(
            publish_error(lapin::Error::InvalidChannelState(ChannelState::Closed)),
            EventPublisherError::channel_closed()
        );
        assert_eq!(
            publish_error(lapin::Error::InvalidConnectionState(ConnectionState::Closed)),
            EventPublisherError::channel_closed()
        );
    }
}
