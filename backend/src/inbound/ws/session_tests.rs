//! Relay session tests over a real socket.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, dev::ServerHandle, web};
use awc::error::WsClientError;
use awc::{BoxedSocket, ws::Codec, ws::Frame};
use futures_util::{SinkExt, StreamExt};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::domain::ports::DriverDirectory;
use crate::domain::{DriverId, DriverRegistry, PackageSlug, SeededProfileGenerator, frame_types};
use crate::inbound::ws::state::WsState;
use crate::inbound::ws::{driver_entry, rider_entry};

type Socket = actix_codec::Framed<BoxedSocket, Codec>;

struct Relay {
    url: String,
    state: WsState,
    registry: Arc<DriverRegistry>,
    _server: ServerHandle,
}

impl Relay {
    async fn connect(&self, path: &str) -> Result<Socket, WsClientError> {
        let (_resp, socket) = awc::Client::default()
            .ws(format!("{}{path}", self.url))
            .connect()
            .await?;
        Ok(socket)
    }
}

async fn start_relay(heartbeat: Heartbeat) -> Relay {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let registry = Arc::new(DriverRegistry::new(Arc::new(
        SeededProfileGenerator::from_seed(11),
    )));
    let directory: Arc<dyn DriverDirectory> = registry.clone();
    let state = WsState::new(directory, CancellationToken::new()).with_heartbeat(heartbeat);
    let app_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(driver_entry)
            .service(rider_entry)
    })
    .listen(listener)
    .expect("bind test server")
    .disable_signals()
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    Relay {
        url: format!("http://{addr}"),
        state,
        registry,
        _server: handle,
    }
}

#[fixture]
async fn relay() -> Relay {
    start_relay(Heartbeat::default()).await
}

async fn next_text_frame(socket: &mut Socket) -> Value {
    loop {
        let frame = socket.next().await.expect("response frame").expect("frame");
        match frame {
            Frame::Text(bytes) => return serde_json::from_slice(&bytes).expect("json frame"),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

async fn next_close_reason(socket: &mut Socket) -> Option<CloseReason> {
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(frame) = socket.next().await {
            match frame.expect("frame") {
                Frame::Close(reason) => return reason,
                _ => continue,
            }
        }
        None
    })
    .await
    .expect("close frame within timeout")
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached within timeout");
}

fn driver_id(raw: &str) -> DriverId {
    DriverId::new(raw).expect("valid driver id")
}

#[rstest]
#[actix_rt::test]
async fn driver_is_registered_and_told_its_profile(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=suv")
        .await
        .expect("websocket connect");

    let frame = next_text_frame(&mut socket).await;

    assert_eq!(frame["type"], json!(frame_types::DRIVER_REGISTER));
    assert_eq!(frame["data"]["id"], json!("driver-1"));
    assert_eq!(frame["data"]["packageSlug"], json!("suv"));
    assert_eq!(
        relay.registry.find_available(PackageSlug::Suv),
        vec![driver_id("driver-1")]
    );
}

#[rstest]
#[actix_rt::test]
async fn graceful_close_unregisters_the_driver(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=van")
        .await
        .expect("websocket connect");
    next_text_frame(&mut socket).await;

    socket
        .send(awc::ws::Message::Close(Some(CloseCode::Normal.into())))
        .await
        .expect("send close");

    let registry = Arc::clone(&relay.registry);
    eventually(move || registry.is_empty()).await;
    let hub = Arc::clone(&relay.state.driver_sessions);
    eventually(move || hub.is_empty()).await;
}

#[rstest]
#[actix_rt::test]
async fn abrupt_disconnect_unregisters_the_driver(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=sedan")
        .await
        .expect("websocket connect");
    next_text_frame(&mut socket).await;
    assert_eq!(relay.registry.len(), 1);

    drop(socket);

    let registry = Arc::clone(&relay.registry);
    eventually(move || registry.is_empty()).await;
}

#[rstest]
#[actix_rt::test]
async fn duplicate_driver_session_is_refused(#[future] relay: Relay) {
    let relay = relay.await;
    let mut first = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=suv")
        .await
        .expect("websocket connect");
    next_text_frame(&mut first).await;

    let err = match relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=van")
        .await
    {
        Ok(_) => panic!("second session should be refused"),
        Err(err) => err,
    };

    assert!(matches!(
        err,
        WsClientError::InvalidResponseStatus(status) if status == actix_web::http::StatusCode::BAD_REQUEST
    ));
    assert_eq!(
        relay.registry.find_available(PackageSlug::Suv),
        vec![driver_id("driver-1")]
    );
}

#[rstest]
#[actix_rt::test]
async fn pushed_frames_reach_the_rider(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/riders?userID=rider-1")
        .await
        .expect("websocket connect");
    let hub = Arc::clone(&relay.state.rider_sessions);
    eventually(move || hub.is_connected("rider-1")).await;

    let frame = RelayFrame {
        kind: "trip.event.no_drivers_found".to_owned(),
        data: json!({ "candidateDriverIds": [] }),
    };
    relay
        .state
        .rider_sessions
        .push("rider-1", frame)
        .await
        .expect("rider connected");

    let received = next_text_frame(&mut socket).await;
    assert_eq!(received["type"], json!("trip.event.no_drivers_found"));
}

#[rstest]
#[actix_rt::test]
async fn shutdown_closes_sessions_and_unregisters(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=luxury")
        .await
        .expect("websocket connect");
    next_text_frame(&mut socket).await;

    relay.state.shutdown.cancel();

    let reason = next_close_reason(&mut socket).await.expect("close reason");
    assert_eq!(reason.code, CloseCode::Away);
    let registry = Arc::clone(&relay.registry);
    eventually(move || registry.is_empty()).await;
}

#[rstest]
#[actix_rt::test]
async fn closes_on_malformed_json(#[future] relay: Relay) {
    let relay = relay.await;
    let mut socket = relay
        .connect("/ws/riders?userID=rider-1")
        .await
        .expect("websocket connect");

    socket
        .send(awc::ws::Message::Text("not-json".into()))
        .await
        .expect("send text");

    let reason = next_close_reason(&mut socket).await.expect("close reason");
    assert_eq!(reason.code, CloseCode::Policy);
}

#[actix_rt::test]
async fn closes_after_timeout_and_unregisters() {
    let heartbeat = Heartbeat {
        interval: Duration::from_millis(50),
        client_timeout: Duration::from_millis(100),
    };
    let relay = start_relay(heartbeat).await;
    let mut socket = relay
        .connect("/ws/drivers?userID=driver-1&packageSlug=suv")
        .await
        .expect("websocket connect");

    let reason = next_close_reason(&mut socket).await.expect("close reason");

    assert_eq!(reason.code, CloseCode::Normal);
    assert_eq!(reason.description.as_deref(), Some("heartbeat timeout"));
    let registry = Arc::clone(&relay.registry);
    eventually(move || registry.is_empty()).await;
}

#[test]
fn registration_is_released_before_the_hub_entry() {
    use std::sync::Mutex;

    use crate::domain::ports::MockDriverDirectory;
    use crate::domain::{Coordinate, Driver};
    use crate::inbound::ws::ConnectionHub;

    let hub = Arc::new(ConnectionHub::new());
    let (connection, outbound) = hub.try_attach("driver-1").expect("first attach");
    let attach_during_unregister = Arc::new(Mutex::new(None));

    let mut directory = MockDriverDirectory::new();
    directory.expect_register().times(1).returning(|id, package_slug| Driver {
        id,
        name: "Lando Norris".to_owned(),
        profile_picture: String::new(),
        car_plate: "ABC-123".to_owned(),
        package_slug,
        location: Coordinate {
            latitude: 0.0,
            longitude: 0.0,
        },
        geohash: "s00000000".to_owned(),
    });
    let observed_hub = Arc::clone(&hub);
    let observed = Arc::clone(&attach_during_unregister);
    directory.expect_unregister().times(1).returning(move |_| {
        let attached = observed_hub.try_attach("driver-1").is_some();
        *observed.lock().expect("observation lock") = Some(attached);
        true
    });

    let registration =
        DriverRegistration::acquire(Arc::new(directory), driver_id("driver-1"), PackageSlug::Suv);
    let session = RelaySession::driver(
        registration,
        connection,
        outbound,
        Heartbeat::default(),
        CancellationToken::new(),
    );
    drop(session);

    assert_eq!(
        *attach_during_unregister.lock().expect("observation lock"),
        Some(false)
    );
    assert!(hub.is_empty());
}
