//! # Voice Trip Relay - Main Application Entry Point
//!
//! Starts the relay server:
//! 1. **Loads configuration** from `.env`, `config.toml` and environment variables
//! 2. **Sets up logging** with `tracing`
//! 3. **Reads the upstream API key**; the relay refuses to start without one
//! 4. **Starts the trip hub** actor that owns every stored trip
//! 5. **Serves HTTP and WebSocket** until SIGINT/SIGTERM
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: the whole server is asynchronous
//! - **Result<T, E>** and `?`: any startup failure ends the process with a message
//! - **Arc<dyn Trait>**: the upstream connector is chosen here and shared by all sockets
//! - **tokio::select!**: waits for whichever comes first, server exit or shutdown signal

use actix::Actor;
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_trip_relay::config::AppConfig;
use voice_trip_relay::server;
use voice_trip_relay::state::AppState;
use voice_trip_relay::trips::TripHub;
use voice_trip_relay::upstream::GeminiLiveConnector;

#[actix_web::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;
    let api_key = AppConfig::api_key_from_env()?;

    // tokio-tungstenite needs a process-wide rustls provider for wss://
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting voice-trip-relay v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        model = %config.upstream.model,
        voice = %config.upstream.voice,
        "Configuration loaded"
    );

    let connector = Arc::new(GeminiLiveConnector::new(&config.upstream, api_key));
    let trips = TripHub::new().start();
    let app_state = AppState::new(config.clone(), trips, connector);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let (server, addrs) = server::bind(app_state, &bind_addr)?;
    info!(addresses = ?addrs, "HTTP server listening");

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        result = wait_for_shutdown() => {
            if let Err(e) = result {
                error!("Signal handling failed: {:#}", e);
            }
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` controls the filter; defaults to debug for this crate and
/// info for actix-web.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_trip_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Resolves on SIGTERM or SIGINT.
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}
