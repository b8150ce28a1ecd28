//! Server construction: adapters, broker consumers, and the HTTP app.

mod config;

pub use config::ServerConfig;

use std::future::Future;
use std::sync::Arc;

use actix_web::dev::{Server, ServerHandle, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(debug_assertions)]
use dispatch_backend::doc::ApiDoc;
use dispatch_backend::domain::ports::{DriverDirectory, EventPublisher, MessageHandler};
use dispatch_backend::domain::{
    DriverRegistry, SeededProfileGenerator, TripEventConsumer, TripService, queues,
};
use dispatch_backend::inbound::http::health::{HealthState, live, ready};
use dispatch_backend::inbound::http::json_config;
use dispatch_backend::inbound::http::state::HttpState;
use dispatch_backend::inbound::http::trips::{preview_trip, start_trip};
use dispatch_backend::inbound::ws::state::WsState;
use dispatch_backend::inbound::ws::{
    DriverTripRequestRelay, RiderNoDriversRelay, driver_entry, rider_entry,
};
use dispatch_backend::outbound::amqp::AmqpBroker;
use dispatch_backend::outbound::broker::{Broker, Topology};
use dispatch_backend::outbound::osrm::OsrmRouteProvider;
use dispatch_backend::outbound::persistence::InMemoryTripRepository;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Where events are published and consumed.
///
/// An AMQP broker when a URI is configured, otherwise the in-process broker.
#[derive(Debug, Clone)]
enum MessageBus {
    InProcess(Broker),
    Amqp(AmqpBroker),
}

impl MessageBus {
    async fn connect(amqp_uri: Option<&str>) -> std::io::Result<Self> {
        let topology = Topology::dispatch();
        match amqp_uri {
            Some(uri) => AmqpBroker::connect(uri, &topology)
                .await
                .map(Self::Amqp)
                .map_err(std::io::Error::other),
            None => {
                info!("no AMQP URI configured; using the in-process broker");
                Broker::with_topology(&topology)
                    .map(Self::InProcess)
                    .map_err(std::io::Error::other)
            }
        }
    }

    fn publisher(&self) -> Arc<dyn EventPublisher> {
        match self {
            Self::InProcess(broker) => Arc::new(broker.clone()),
            Self::Amqp(broker) => Arc::new(broker.clone()),
        }
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: &CancellationToken,
    ) -> std::io::Result<JoinHandle<()>> {
        match self {
            Self::InProcess(broker) => broker
                .subscribe(queue, handler, shutdown.clone())
                .map_err(std::io::Error::other),
            Self::Amqp(broker) => broker
                .subscribe(queue, handler, shutdown.clone())
                .await
                .map_err(std::io::Error::other),
        }
    }

    async fn close(&self) {
        match self {
            Self::InProcess(broker) => broker.close(),
            Self::Amqp(broker) => broker.close().await,
        }
    }
}

/// A bound server plus the background work that must drain after it stops.
pub struct DispatchServer {
    server: Server,
    bus: MessageBus,
    consumers: Vec<JoinHandle<()>>,
}

impl DispatchServer {
    /// Handle used to stop the HTTP server from another task.
    pub fn handle(&self) -> ServerHandle {
        self.server.handle()
    }

    /// Drive the HTTP server to completion, then wait for consumer loops to
    /// finish and close the broker.
    ///
    /// Consumers only finish once the shutdown token has been cancelled.
    ///
    /// # Errors
    /// Propagates the server's [`std::io::Error`].
    pub async fn run(self) -> std::io::Result<()> {
        self.server.await?;
        for consumer in self.consumers {
            if let Err(error) = consumer.await {
                warn!(error = %error, "consumer task ended abnormally");
            }
        }
        self.bus.close().await;
        info!("broker closed");
        Ok(())
    }
}

/// Wait for `signal`, then drain: fail health checks, cancel consumers and
/// relay sessions, and stop the HTTP server gracefully.
///
/// A signal listener that fails to install leaves the server running.
pub async fn shutdown_on(
    signal: impl Future<Output = std::io::Result<()>>,
    health_state: web::Data<HealthState>,
    shutdown: CancellationToken,
    handle: ServerHandle,
) {
    if let Err(error) = signal.await {
        warn!(error = %error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
    health_state.mark_unhealthy();
    shutdown.cancel();
    handle.stop(true).await;
}

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    ws_state: web::Data<WsState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        ws_state,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(ws_state)
        .app_data(json_config())
        .service(preview_trip)
        .service(start_trip)
        .service(driver_entry)
        .service(rider_entry)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Wire adapters and consumers, then bind the HTTP server.
///
/// Readiness is flipped once the consumers are running and the socket is
/// bound. Cancelling `shutdown` ends consumer loops and relay sessions.
///
/// # Errors
/// Propagates [`std::io::Error`] when the broker is unreachable or refuses
/// the topology, the HTTP client cannot be built, or binding the socket
/// fails.
pub async fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> std::io::Result<DispatchServer> {
    let bus = MessageBus::connect(config.amqp_uri.as_deref()).await?;
    let routes = OsrmRouteProvider::new(config.osrm_base_url.clone(), config.osrm_timeout)
        .map_err(std::io::Error::other)?;
    let trips = TripService::new(
        Arc::new(routes),
        Arc::new(InMemoryTripRepository::new()),
        bus.publisher(),
    )
    .with_pricing(config.pricing);

    let profiles = match config.registry_seed {
        Some(seed) => SeededProfileGenerator::from_seed(seed),
        None => SeededProfileGenerator::from_entropy(),
    };
    let registry = Arc::new(DriverRegistry::new(Arc::new(profiles)));
    let drivers: Arc<dyn DriverDirectory> = registry.clone();
    let ws_state =
        WsState::new(Arc::clone(&drivers), shutdown.clone()).with_heartbeat(config.heartbeat);

    let consumers = vec![
        bus.subscribe(
            queues::FIND_AVAILABLE_DRIVERS,
            Arc::new(TripEventConsumer::new(drivers, bus.publisher())),
            &shutdown,
        )
        .await?,
        bus.subscribe(
            queues::DRIVER_CMD_TRIP_REQUEST,
            Arc::new(DriverTripRequestRelay::new(Arc::clone(
                &ws_state.driver_sessions,
            ))),
            &shutdown,
        )
        .await?,
        bus.subscribe(
            queues::NOTIFY_RIDER_NO_DRIVERS_FOUND,
            Arc::new(RiderNoDriversRelay::new(Arc::clone(&ws_state.rider_sessions))),
            &shutdown,
        )
        .await?,
    ];

    let deps = AppDependencies {
        health_state: health_state.clone(),
        http_state: web::Data::new(HttpState::new(Arc::new(trips))),
        ws_state: web::Data::new(ws_state),
    };
    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind(config.bind_addr)?
        .disable_signals()
        .run();

    health_state.mark_ready();
    info!(addr = %config.bind_addr, "dispatch server listening");
    Ok(DispatchServer {
        server,
        bus,
        consumers,
    })
}
