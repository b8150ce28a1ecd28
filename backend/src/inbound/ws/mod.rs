//! WebSocket relay adapter.
//!
//! Responsibilities:
//! - validate the subject named in the upgrade query before upgrading
//! - register drivers for the lifetime of their session
//! - attach sessions to the connection hubs that relay consumers push into

use std::sync::Arc;

use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use serde_json::json;
use tracing::error;

use crate::domain::DomainError;

mod hub;
mod registration;
mod relay;
mod session;

pub mod messages;
pub mod state;

pub use hub::{ConnectionHub, HubConnection, PushError};
pub use registration::DriverRegistration;
pub use relay::{DriverTripRequestRelay, RiderNoDriversRelay};

use messages::{DriverConnect, DriverQuery, RiderConnect, RiderQuery};
use session::RelaySession;
use state::WsState;

fn already_connected(subject: &str) -> DomainError {
    DomainError::invalid_request("a session for this user is already open")
        .with_details(json!({ "field": "userID", "value": subject }))
}

fn upgrade(
    req: &HttpRequest,
    stream: Payload,
) -> actix_web::Result<(HttpResponse, actix_ws::Session, actix_ws::MessageStream)> {
    actix_ws::handle(req, stream).inspect_err(|error| {
        error!(error = %error, "WebSocket upgrade failed");
    })
}

/// Driver relay: `GET /ws/drivers?userID=..&packageSlug=..`.
#[get("/ws/drivers")]
pub async fn driver_entry(
    state: web::Data<WsState>,
    query: web::Query<DriverQuery>,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let connect = DriverConnect::try_from(query.into_inner())?;
    let Some((connection, outbound)) = state
        .driver_sessions
        .try_attach(connect.driver_id.as_ref())
    else {
        return Err(already_connected(connect.driver_id.as_ref()).into());
    };
    let (response, session, messages) = upgrade(&req, stream)?;

    let registration = DriverRegistration::acquire(
        Arc::clone(&state.drivers),
        connect.driver_id,
        connect.package_slug,
    );
    let relay = RelaySession::driver(
        registration,
        connection,
        outbound,
        state.heartbeat,
        state.shutdown.child_token(),
    );
    actix_web::rt::spawn(relay.run(session, messages));
    Ok(response)
}

/// Rider relay: `GET /ws/riders?userID=..`.
#[get("/ws/riders")]
pub async fn rider_entry(
    state: web::Data<WsState>,
    query: web::Query<RiderQuery>,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let connect = RiderConnect::try_from(query.into_inner())?;
    let Some((connection, outbound)) = state.rider_sessions.try_attach(connect.user_id.as_ref())
    else {
        return Err(already_connected(connect.user_id.as_ref()).into());
    };
    let (response, session, messages) = upgrade(&req, stream)?;

    let relay = RelaySession::rider(
        connection,
        outbound,
        state.heartbeat,
        state.shutdown.child_token(),
    );
    actix_web::rt::spawn(relay.run(session, messages));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::domain::ports::MockDriverDirectory;

    fn state_without_side_effects() -> WsState {
        let mut directory = MockDriverDirectory::new();
        directory.expect_register().never();
        directory.expect_unregister().never();
        WsState::new(Arc::new(directory), CancellationToken::new())
    }

    #[rstest]
    #[case("/ws/drivers")]
    #[case("/ws/drivers?userID=driver-1")]
    #[case("/ws/drivers?packageSlug=suv")]
    #[case("/ws/drivers?userID=driver-1&packageSlug=bicycle")]
    #[case("/ws/drivers?userID=&packageSlug=suv")]
    #[case("/ws/riders")]
    #[case("/ws/riders?userID=")]
    #[actix_rt::test]
    async fn invalid_query_is_rejected_before_upgrade(#[case] uri: &str) {
        let state = state_without_side_effects();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(driver_entry)
                .service(rider_entry),
        )
        .await;

        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request())
                .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.driver_sessions.is_empty());
        assert!(state.rider_sessions.is_empty());
    }

    #[actix_rt::test]
    async fn failed_upgrade_releases_the_hub_entry() {
        let state = state_without_side_effects();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(driver_entry),
        )
        .await;

        // No upgrade headers, so the handshake fails after validation.
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/ws/drivers?userID=driver-1&packageSlug=suv")
                .to_request(),
        )
        .await;

        assert!(response.status().is_client_error());
        assert!(state.driver_sessions.is_empty());
    }
}
