//! In-process topic-exchange broker.
//!
//! Speaks the same contract the services expect from an AMQP broker: durable
//! topic exchanges, queues bound by routing-key patterns, persistent JSON
//! messages, prefetch-1 consumers with manual acknowledgement, and
//! nack-without-requeue (optionally into a dead-letter queue). Declarations are
//! idempotent; conflicting redeclarations fail with
//! [`BrokerError::PreconditionFailed`].
//!
//! One [`Broker`] is shared process-wide. [`Broker::close`] stops publishes
//! and ends consumer loops; there is no reconnection.

mod consumer;
mod delivery;
mod error;
mod queue;
mod topology;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

pub use self::delivery::Delivery;
pub use self::error::BrokerError;
pub use self::queue::QueueStats;
pub use self::topology::{Binding, ExchangeSpec, QueueSpec, Topology, topic_matches};
use self::queue::QueueState;
use crate::domain::ports::{EventPublisher, EventPublisherError};
use crate::domain::{BrokerMessage, DeliveryMode, EventEnvelope, TRIP_EXCHANGE};

#[derive(Debug, Default)]
struct BrokerState {
    closed: bool,
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    next_delivery_tag: u64,
}

#[derive(Debug, Default)]
pub(crate) struct BrokerInner {
    state: Mutex<BrokerState>,
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ack(&self, queue: &str) {
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            q.stats.unacked = q.stats.unacked.saturating_sub(1);
            q.stats.acked += 1;
        }
    }

    fn nack(&self, queue: &str, message: BrokerMessage) {
        let mut state = self.lock();
        let Some(q) = state.queues.get_mut(queue) else {
            return;
        };
        q.stats.unacked = q.stats.unacked.saturating_sub(1);
        q.stats.nacked += 1;
        let dead_letter = q.spec.dead_letter.clone();

        let Some(dlq_name) = dead_letter else {
            warn!(queue, routing_key = %message.routing_key, "discarding rejected message");
            return;
        };
        match state.queues.get_mut(&dlq_name) {
            Some(dlq) => {
                dlq.push_back(message);
                if let Some(q) = state.queues.get_mut(queue) {
                    q.stats.dead_lettered += 1;
                }
                debug!(queue, dead_letter = %dlq_name, "rejected message dead-lettered");
            }
            None => warn!(
                queue,
                dead_letter = %dlq_name,
                "dead-letter queue missing; discarding rejected message"
            ),
        }
    }

    fn requeue(&self, queue: &str, message: BrokerMessage) {
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            debug!(queue, routing_key = %message.routing_key, "requeueing unsettled delivery");
            q.requeue_front(message);
        }
    }
}

/// Shared handle to the broker; clones refer to the same broker.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// An empty broker with nothing declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker with `topology` already declared.
    ///
    /// # Errors
    ///
    /// Fails when the topology contradicts itself.
    pub fn with_topology(topology: &Topology) -> Result<Self, BrokerError> {
        let broker = Self::new();
        broker.declare(topology)?;
        Ok(broker)
    }

    /// Declare every exchange, queue, and binding in `topology`.
    pub fn declare(&self, topology: &Topology) -> Result<(), BrokerError> {
        for exchange in &topology.exchanges {
            self.declare_exchange(exchange)?;
        }
        for queue in &topology.queues {
            self.declare_queue(queue)?;
        }
        for binding in &topology.bindings {
            self.bind(binding)?;
        }
        Ok(())
    }

    /// Declare a topic exchange. Redeclaring the same spec is a no-op.
    ///
    /// # Errors
    ///
    /// [`BrokerError::PreconditionFailed`] when the exchange exists with a
    /// different spec and [`BrokerError::ChannelClosed`] after [`Broker::close`].
    pub fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        let mut state = self.inner.lock();
        ensure_open(&state)?;
        match state.exchanges.get(&spec.name) {
            Some(existing) if existing == spec => Ok(()),
            Some(existing) => Err(BrokerError::PreconditionFailed {
                message: format!(
                    "exchange `{}` already declared with durable={}",
                    spec.name, existing.durable
                ),
            }),
            None => {
                state.exchanges.insert(spec.name.clone(), spec.clone());
                debug!(exchange = %spec.name, "exchange declared");
                Ok(())
            }
        }
    }

    /// Declare a queue. Redeclaring the same spec is a no-op.
    ///
    /// # Errors
    ///
    /// [`BrokerError::PreconditionFailed`] when the queue exists with a
    /// different spec and [`BrokerError::ChannelClosed`] after [`Broker::close`].
    pub fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut state = self.inner.lock();
        ensure_open(&state)?;
        match state.queues.get(&spec.name) {
            Some(existing) if existing.spec == *spec => Ok(()),
            Some(existing) => Err(BrokerError::PreconditionFailed {
                message: format!(
                    "queue `{}` already declared with durable={} dead_letter={:?}",
                    spec.name, existing.spec.durable, existing.spec.dead_letter
                ),
            }),
            None => {
                state
                    .queues
                    .insert(spec.name.clone(), QueueState::new(spec.clone()));
                debug!(queue = %spec.name, "queue declared");
                Ok(())
            }
        }
    }

    /// Bind a declared queue to a declared exchange. Rebinding is a no-op.
    pub fn bind(&self, binding: &Binding) -> Result<(), BrokerError> {
        let mut state = self.inner.lock();
        ensure_open(&state)?;
        if !state.exchanges.contains_key(&binding.exchange) {
            return Err(BrokerError::UnknownExchange {
                exchange: binding.exchange.clone(),
            });
        }
        if !state.queues.contains_key(&binding.queue) {
            return Err(BrokerError::UnknownQueue {
                queue: binding.queue.clone(),
            });
        }
        if !state.bindings.contains(binding) {
            debug!(
                exchange = %binding.exchange,
                queue = %binding.queue,
                pattern = %binding.pattern,
                "queue bound"
            );
            state.bindings.push(binding.clone());
        }
        Ok(())
    }

    /// Serialise `payload` and publish it persistently on the trip exchange.
    ///
    /// A key no binding matches is accepted and delivered nowhere.
    ///
    /// # Errors
    ///
    /// [`BrokerError::ChannelClosed`] after [`Broker::close`];
    /// [`BrokerError::Serialization`] when `payload` cannot be encoded.
    pub fn publish<T: Serialize + ?Sized>(
        &self,
        routing_key: &str,
        payload: &T,
    ) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(payload).map_err(|err| BrokerError::Serialization {
            message: err.to_string(),
        })?;
        self.publish_message(
            TRIP_EXCHANGE,
            BrokerMessage {
                routing_key: routing_key.to_owned(),
                payload: body,
                delivery_mode: DeliveryMode::Persistent,
            },
        )
    }

    /// Route an already encoded message through `exchange` to every bound
    /// queue.
    ///
    /// # Errors
    ///
    /// [`BrokerError::UnknownExchange`] for an undeclared exchange and
    /// [`BrokerError::ChannelClosed`] after [`Broker::close`].
    pub fn publish_message(
        &self,
        exchange: &str,
        message: BrokerMessage,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.lock();
        ensure_open(&state)?;
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::UnknownExchange {
                exchange: exchange.to_owned(),
            });
        }

        let mut targets: Vec<String> = Vec::new();
        for binding in &state.bindings {
            if binding.exchange == exchange
                && topic_matches(&binding.pattern, &message.routing_key)
                && !targets.contains(&binding.queue)
            {
                targets.push(binding.queue.clone());
            }
        }

        if targets.is_empty() {
            debug!(exchange, routing_key = %message.routing_key, "no binding matched; message dropped");
            return Ok(());
        }

        let last = targets.len() - 1;
        let mut message = Some(message);
        for (i, queue) in targets.iter().enumerate() {
            let Some(q) = state.queues.get_mut(queue) else {
                continue;
            };
            let copy = if i == last {
                message.take()
            } else {
                message.clone()
            };
            if let Some(copy) = copy {
                q.push_back(copy);
            }
        }
        debug!(exchange, queues = ?targets, "message routed");
        Ok(())
    }

    /// Wait for the next message on `queue`.
    ///
    /// Cancel-safe: dropping the future before it resolves takes nothing
    /// from the queue.
    ///
    /// # Errors
    ///
    /// [`BrokerError::UnknownQueue`] for an undeclared queue and
    /// [`BrokerError::ChannelClosed`] once the broker is closed.
    pub async fn next_delivery(&self, queue: &str) -> Result<Delivery, BrokerError> {
        let notify = {
            let state = self.inner.lock();
            let q = state.queues.get(queue).ok_or_else(|| BrokerError::UnknownQueue {
                queue: queue.to_owned(),
            })?;
            Arc::clone(&q.notify)
        };

        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock();
                ensure_open(&state)?;
                let tag = state.next_delivery_tag + 1;
                let taken = state.queues.get_mut(queue).and_then(|q| q.take());
                if let Some(pending) = taken {
                    state.next_delivery_tag = tag;
                    return Ok(Delivery::new(
                        Arc::clone(&self.inner),
                        queue.to_owned(),
                        tag,
                        pending.message,
                        pending.redelivered,
                    ));
                }
            }

            notified.await;
        }
    }

    /// Counters for `queue`, or `None` when it is not declared.
    pub fn queue_stats(&self, queue: &str) -> Option<QueueStats> {
        self.inner.lock().queues.get(queue).map(QueueState::stats)
    }

    /// Stop accepting publishes and wake every waiting consumer.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        for q in state.queues.values() {
            q.notify.notify_waiters();
        }
        debug!("broker closed");
    }

    /// Whether [`Broker::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

fn ensure_open(state: &BrokerState) -> Result<(), BrokerError> {
    if state.closed {
        Err(BrokerError::ChannelClosed)
    } else {
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for Broker {
    async fn publish(
        &self,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), EventPublisherError> {
        Broker::publish(self, routing_key, envelope).map_err(|err| match err {
            BrokerError::ChannelClosed => EventPublisherError::channel_closed(),
            BrokerError::Serialization { message } => EventPublisherError::encode(message),
            other => EventPublisherError::rejected(other.to_string()),
        })
    }
}
