//! Per-connection relay session.
//!
//! A session is `Active` from the moment its task starts until the loop
//! below returns; dropping the session value is the `Closed` transition.
//! The loop multiplexes client frames, heartbeat ticks, frames pushed through
//! the connection hub, and process shutdown.

use std::time::Instant;

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::hub::HubConnection;
use super::messages::register_frame;
use super::registration::DriverRegistration;
use super::state::Heartbeat;
use crate::domain::RelayFrame;

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Shutdown,
    Protocol(ProtocolError),
    InvalidPayload,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

pub(super) struct RelaySession {
    // Fields drop in declaration order. The registration goes first, while
    // the outbound receiver is still open and the hub refuses a second
    // session for this subject.
    registration: Option<DriverRegistration>,
    role: &'static str,
    outbound: mpsc::Receiver<RelayFrame>,
    heartbeat: Heartbeat,
    shutdown: CancellationToken,
    connection: HubConnection,
}

impl RelaySession {
    pub(super) fn driver(
        registration: DriverRegistration,
        connection: HubConnection,
        outbound: mpsc::Receiver<RelayFrame>,
        heartbeat: Heartbeat,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registration: Some(registration),
            role: "driver",
            outbound,
            heartbeat,
            shutdown,
            connection,
        }
    }

    pub(super) fn rider(
        connection: HubConnection,
        outbound: mpsc::Receiver<RelayFrame>,
        heartbeat: Heartbeat,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registration: None,
            role: "rider",
            outbound,
            heartbeat,
            shutdown,
            connection,
        }
    }

    pub(super) async fn run(mut self, mut session: Session, mut stream: MessageStream) {
        info!(role = self.role, subject = self.connection.subject(), "relay session opened");

        if let Err(error) = self.send_register_frame(&mut session).await {
            self.finish(session, error).await;
            return;
        }

        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(self.heartbeat.interval);

        loop {
            let result = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Err(SessionError::Shutdown),
                _ = heartbeat.tick() => {
                    self.handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                frame = self.outbound.recv() => {
                    match frame {
                        Some(frame) => send_json(&mut session, &frame)
                            .await
                            .map_err(SessionError::Network),
                        None => Err(SessionError::StreamClosed),
                    }
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
            };

            if let Err(error) = result {
                self.finish(session, error).await;
                return;
            }
        }
    }

    async fn send_register_frame(&self, session: &mut Session) -> Result<(), SessionError> {
        let Some(registration) = &self.registration else {
            return Ok(());
        };
        match register_frame(registration.driver()) {
            Ok(frame) => send_json(session, &frame)
                .await
                .map_err(SessionError::Network),
            Err(error) => {
                warn!(error = %error, "Failed to serialise driver registration frame");
                Ok(())
            }
        }
    }

    async fn handle_heartbeat_tick(
        &self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > self.heartbeat.client_timeout {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(text.as_ref())
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    fn handle_text_message(&self, text: &str) -> Result<(), SessionError> {
        match serde_json::from_str::<RelayFrame>(text) {
            Ok(frame) => {
                debug!(
                    role = self.role,
                    subject = self.connection.subject(),
                    kind = %frame.kind,
                    "received relay frame"
                );
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Rejected malformed relay frame");
                Err(SessionError::InvalidPayload)
            }
        }
    }

    async fn finish(self, session: Session, error: SessionError) {
        self.log_shutdown_reason(&error);
        close_session_if_needed(session, close_action_for(error)).await;
        info!(role = self.role, subject = self.connection.subject(), "relay session closed");
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!("WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::Shutdown => {
                debug!("closing relay session for shutdown");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }
}

async fn send_json(session: &mut Session, frame: &RelayFrame) -> Result<(), Closed> {
    match serde_json::to_string(frame) {
        Ok(body) => session.text(body).await,
        Err(error) => {
            warn!(error = %error, kind = %frame.kind, "Failed to serialise relay frame");
            Ok(())
        }
    }
}

fn close_action_for(error: SessionError) -> CloseAction {
    match error {
        SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Normal,
            description: Some("heartbeat timeout".to_owned()),
        })),
        SessionError::Shutdown => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Away,
            description: Some("server shutting down".to_owned()),
        })),
        SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Protocol,
            description: Some("protocol error".to_owned()),
        })),
        SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Policy,
            description: Some("invalid payload".to_owned()),
        })),
        SessionError::ClientClosed(reason) => CloseAction::Close(reason),
        SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
    }
}

async fn close_session_if_needed(session: Session, close_action: CloseAction) {
    if let CloseAction::Close(reason) = close_action {
        if let Err(error) = session.close(reason).await {
            warn!(error = %error, "Failed to close WebSocket session");
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
