//! Partner Bridge web server.
//!
//! This binary:
//! - Receives webhooks from the counterpart and verifies their signatures
//! - Sends signed events to the counterpart on request
//! - Registers with the counterpart to obtain the shared secret
//! - Exposes the in-memory event ledger for inspection

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use partner_bridge::web::router;
use partner_bridge::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("partner_bridge_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        host = %config.host,
        port = config.port,
        webhook_url = %config.webhook_url(),
        counterpart_url = %config.counterpart_url,
        counterpart_payment_url = %config.counterpart_payment_url,
        send_timeout_ms = config.send_timeout_ms,
        max_events = config.max_events,
        "config_loaded"
    );

    // One HTTP client shared by outbound sends, registration and health probes
    let client = Client::builder()
        .pool_max_idle_per_host(16)
        .build()
        .context("Failed to create HTTP client")?;

    // Bind to address (HOST may be a name)
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .context("Failed to bind to address")?;
    let addr = listener
        .local_addr()
        .context("Failed to read bound address")?;

    let app = router(AppState::new(config, client));

    info!(address = %addr, "partner_bridge_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("partner_bridge_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("partner_bridge_shutting_down");
}
