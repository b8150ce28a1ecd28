//! Per-queue state held inside the broker.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Notify;

use super::topology::QueueSpec;
use crate::domain::BrokerMessage;

/// Counters exposed by [`super::Broker::queue_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Messages waiting for a consumer.
    pub ready: usize,
    /// Messages handed to a consumer and not yet settled.
    pub unacked: usize,
    /// Deliveries acknowledged.
    pub acked: u64,
    /// Deliveries rejected.
    pub nacked: u64,
    /// Nacked messages moved to the dead-letter queue.
    pub dead_lettered: u64,
}

#[derive(Debug)]
pub(super) struct Pending {
    pub(super) message: BrokerMessage,
    pub(super) redelivered: bool,
}

#[derive(Debug)]
pub(super) struct QueueState {
    pub(super) spec: QueueSpec,
    pub(super) ready: VecDeque<Pending>,
    pub(super) stats: QueueStats,
    pub(super) notify: Arc<Notify>,
}

impl QueueState {
    pub(super) fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            ready: VecDeque::new(),
            stats: QueueStats::default(),
            notify: Arc::new(Notify::new()),
        }
    }

    pub(super) fn push_back(&mut self, message: BrokerMessage) {
        self.ready.push_back(Pending {
            message,
            redelivered: false,
        });
        self.notify.notify_one();
    }

    /// Return an unsettled message to the head of the queue.
    pub(super) fn requeue_front(&mut self, message: BrokerMessage) {
        self.stats.unacked = self.stats.unacked.saturating_sub(1);
        self.ready.push_front(Pending {
            message,
            redelivered: true,
        });
        self.notify.notify_one();
    }

    pub(super) fn take(&mut self) -> Option<Pending> {
        let pending = self.ready.pop_front()?;
        self.stats.unacked += 1;
        Some(pending)
    }

    pub(super) fn stats(&self) -> QueueStats {
        QueueStats {
            ready: self.ready.len(),
            ..self.stats
        }
    }
}
