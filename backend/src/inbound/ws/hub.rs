//! Routing table from subject ids to live relay sessions.
//!
//! Each session attaches under its subject id and receives pushed frames
//! through a bounded channel. At most one live session exists per subject;
//! the [`HubConnection`] guard detaches on drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::RelayFrame;

/// Frames buffered per session before pushes apply backpressure.
const OUTBOUND_BUFFER: usize = 32;

/// Failure pushing a frame to a subject.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("subject {subject} is not connected")]
    NotConnected { subject: String },
}

/// Subject id → outbound channel map shared by sessions and relay consumers.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    sessions: Mutex<HashMap<String, mpsc::Sender<RelayFrame>>>,
}

impl ConnectionHub {
    /// An empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session for `subject`.
    ///
    /// Returns `None` while another live session holds the subject.
    pub fn try_attach(
        self: &Arc<Self>,
        subject: &str,
    ) -> Option<(HubConnection, mpsc::Receiver<RelayFrame>)> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(subject).is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        sessions.insert(subject.to_owned(), tx.clone());
        drop(sessions);

        debug!(subject, "relay session attached");
        let connection = HubConnection {
            hub: Arc::clone(self),
            subject: subject.to_owned(),
            sender: tx,
        };
        Some((connection, rx))
    }

    /// Deliver `frame` to the session attached under `subject`.
    pub async fn push(&self, subject: &str, frame: RelayFrame) -> Result<(), PushError> {
        let sender = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .cloned();
        let not_connected = || PushError::NotConnected {
            subject: subject.to_owned(),
        };
        let sender = sender.ok_or_else(not_connected)?;
        sender.send(frame).await.map_err(|_| not_connected())
    }

    /// Whether a live session is attached under `subject`.
    pub fn is_connected(&self, subject: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of attached subjects.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no session is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn detach(&self, subject: &str, sender: &mpsc::Sender<RelayFrame>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions
            .get(subject)
            .is_some_and(|current| current.same_channel(sender))
        {
            sessions.remove(subject);
            debug!(subject, "relay session detached");
        }
    }
}

/// Hub entry owned by one session.
#[derive(Debug)]
pub struct HubConnection {
    hub: Arc<ConnectionHub>,
    subject: String,
    sender: mpsc::Sender<RelayFrame>,
}

impl HubConnection {
    /// Subject id this connection is attached under.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.hub.detach(&self.subject, &self.sender);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(kind: &str) -> RelayFrame {
        RelayFrame {
            kind: kind.to_owned(),
            data: json!({}),
        }
    }

    #[tokio::test]
    async fn pushes_reach_the_attached_session() {
        let hub = Arc::new(ConnectionHub::new());
        let (_connection, mut rx) = hub.try_attach("rider-1").expect("subject free");

        hub.push("rider-1", frame("a")).await.expect("push succeeds");

        assert_eq!(rx.recv().await.map(|f| f.kind), Some("a".to_owned()));
    }

    #[tokio::test]
    async fn push_to_unknown_subject_reports_not_connected() {
        let hub = ConnectionHub::new();
        let err = hub.push("nobody", frame("a")).await.expect_err("no session");
        assert_eq!(
            err,
            PushError::NotConnected {
                subject: "nobody".to_owned()
            }
        );
    }

    #[test]
    fn second_live_attach_is_refused() {
        let hub = Arc::new(ConnectionHub::new());
        let first = hub.try_attach("driver-1");
        assert!(first.is_some());
        assert!(hub.try_attach("driver-1").is_none());
    }

    #[test]
    fn dropping_the_connection_frees_the_subject() {
        let hub = Arc::new(ConnectionHub::new());
        let attached = hub.try_attach("driver-1");
        drop(attached);

        assert!(hub.is_empty());
        assert!(hub.try_attach("driver-1").is_some());
    }

    #[test]
    fn stale_entry_with_dropped_receiver_can_be_replaced() {
        let hub = Arc::new(ConnectionHub::new());
        let (old_connection, rx) = hub.try_attach("driver-1").expect("subject free");
        drop(rx);

        let (_new_connection, _rx) = hub.try_attach("driver-1").expect("stale entry replaced");
        drop(old_connection);

        assert!(hub.is_connected("driver-1"));
    }
}
