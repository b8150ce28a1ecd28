//! Exchange, queue, and binding declarations.
//!
//! Binding patterns follow AMQP topic rules: keys are split on `.`, `*`
//! matches exactly one word and `#` matches zero or more words.

use crate::domain::{TRIP_EXCHANGE, queues, routing_keys};

/// A durable or transient topic exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub durable: bool,
}

impl ExchangeSpec {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
        }
    }
}

/// Queue properties compared on redeclaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    /// Queue receiving messages rejected without requeue.
    pub dead_letter: Option<String>,
}

impl QueueSpec {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            dead_letter: None,
        }
    }

    /// Route rejected messages to `queue` instead of dropping them.
    pub fn with_dead_letter(mut self, queue: impl Into<String>) -> Self {
        self.dead_letter = Some(queue.into());
        self
    }
}

/// A queue subscribed to routing keys on an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub exchange: String,
    pub queue: String,
    /// Topic pattern matched against routing keys.
    pub pattern: String,
}

/// Everything declared on broker start-up.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Exchanges, declared first.
    pub exchanges: Vec<ExchangeSpec>,
    /// Queues, declared after the exchanges.
    pub queues: Vec<QueueSpec>,
    /// Bindings, declared last.
    pub bindings: Vec<Binding>,
}

impl Topology {
    /// Declare `spec`.
    pub fn exchange(mut self, spec: ExchangeSpec) -> Self {
        self.exchanges.push(spec);
        self
    }

    /// Declare `spec` and bind it to each of `patterns` on `exchange`.
    pub fn queue(mut self, exchange: &str, spec: QueueSpec, patterns: &[&str]) -> Self {
        self.bindings
            .extend(patterns.iter().map(|pattern| Binding {
                exchange: exchange.to_owned(),
                queue: spec.name.clone(),
                pattern: (*pattern).to_owned(),
            }));
        self.queues.push(spec);
        self
    }

    /// The dispatch pipeline's exchange, queues, and bindings.
    ///
    /// | queue | routing keys |
    /// |---|---|
    /// | `find_available_drivers` | `trip.event.created`, `trip.event.driver_not_interested` |
    /// | `driver_cmd_trip_request` | `driver.cmd.trip_request` |
    /// | `notify_rider_no_drivers_found` | `trip.event.no_drivers_found` |
    ///
    /// `find_available_drivers` dead-letters into
    /// `find_available_drivers.dead_letter`.
    pub fn dispatch() -> Self {
        Self::default()
            .exchange(ExchangeSpec::durable(TRIP_EXCHANGE))
            .queue(
                TRIP_EXCHANGE,
                QueueSpec::durable(queues::FIND_AVAILABLE_DRIVERS_DEAD_LETTER),
                &[],
            )
            .queue(
                TRIP_EXCHANGE,
                QueueSpec::durable(queues::FIND_AVAILABLE_DRIVERS)
                    .with_dead_letter(queues::FIND_AVAILABLE_DRIVERS_DEAD_LETTER),
                &[
                    routing_keys::TRIP_CREATED,
                    routing_keys::TRIP_DRIVER_NOT_INTERESTED,
                ],
            )
            .queue(
                TRIP_EXCHANGE,
                QueueSpec::durable(queues::DRIVER_CMD_TRIP_REQUEST),
                &[routing_keys::DRIVER_TRIP_REQUEST],
            )
            .queue(
                TRIP_EXCHANGE,
                QueueSpec::durable(queues::NOTIFY_RIDER_NO_DRIVERS_FOUND),
                &[routing_keys::TRIP_NO_DRIVERS_FOUND],
            )
    }
}

/// Whether `routing_key` matches the binding `pattern`.
///
/// # Examples
/// ```
/// use dispatch_backend::outbound::broker::topic_matches;
///
/// assert!(topic_matches("trip.event.*", "trip.event.created"));
/// assert!(topic_matches("trip.#", "trip"));
/// assert!(!topic_matches("trip.*", "trip.event.created"));
/// ```
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    words_match(&pattern, &key)
}

fn words_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| words_match(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && words_match(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && words_match(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("trip.event.created", "trip.event.created", true)]
    #[case("trip.event.created", "trip.event.cancelled", false)]
    #[case("trip.event.*", "trip.event.created", true)]
    #[case("trip.event.*", "trip.event", false)]
    #[case("trip.*.created", "trip.event.created", true)]
    #[case("*.cmd.*", "driver.cmd.trip_request", true)]
    #[case("trip.#", "trip", true)]
    #[case("trip.#", "trip.event.created", true)]
    #[case("#", "driver.cmd.trip_request", true)]
    #[case("#.created", "trip.event.created", true)]
    #[case("#.created", "trip.event.created.late", false)]
    #[case("trip.#.created", "trip.created", true)]
    #[case("driver.#", "trip.event.created", false)]
    fn matches_topic_patterns(#[case] pattern: &str, #[case] key: &str, #[case] expected: bool) {
        assert_eq!(topic_matches(pattern, key), expected);
    }

    #[test]
    fn dispatch_topology_binds_every_queue_to_the_trip_exchange() {
        let topology = Topology::dispatch();

        assert_eq!(topology.exchanges, vec![ExchangeSpec::durable(TRIP_EXCHANGE)]);
        assert!(topology.bindings.iter().all(|b| b.exchange == TRIP_EXCHANGE));
        let bound_to = |key: &str| -> Vec<String> {
            topology
                .bindings
                .iter()
                .filter(|b| topic_matches(&b.pattern, key))
                .map(|b| b.queue.clone())
                .collect()
        };
        assert_eq!(
            bound_to(routing_keys::TRIP_CREATED),
            vec![queues::FIND_AVAILABLE_DRIVERS]
        );
        assert_eq!(
            bound_to(routing_keys::TRIP_DRIVER_NOT_INTERESTED),
            vec![queues::FIND_AVAILABLE_DRIVERS]
        );
        assert_eq!(
            bound_to(routing_keys::DRIVER_TRIP_REQUEST),
            vec![queues::DRIVER_CMD_TRIP_REQUEST]
        );
        assert_eq!(
            bound_to(routing_keys::TRIP_NO_DRIVERS_FOUND),
            vec![queues::NOTIFY_RIDER_NO_DRIVERS_FOUND]
        );
    }
}
