//! Backend entry-point: loads settings, wires adapters, and runs until
//! interrupted.

mod server;

use actix_web::web;
use ortho_config::OrthoConfig;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use dispatch_backend::inbound::http::health::HealthState;
use dispatch_backend::settings::DispatchSettings;
use server::{ServerConfig, create_server, shutdown_on};

/// Resolve on Ctrl-C or SIGTERM.
#[cfg(unix)]
async fn termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

/// Resolve on Ctrl-C.
#[cfg(not(unix))]
async fn termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = DispatchSettings::load().map_err(|e| std::io::Error::other(e.to_string()))?;
    let config = ServerConfig::from_settings(&settings).map_err(std::io::Error::other)?;

    let health_state = web::Data::new(HealthState::new());
    let shutdown = CancellationToken::new();
    let dispatch = create_server(health_state.clone(), config, shutdown.clone()).await?;

    actix_web::rt::spawn(shutdown_on(
        termination_signal(),
        health_state,
        shutdown,
        dispatch.handle(),
    ));

    dispatch.run().await
}
