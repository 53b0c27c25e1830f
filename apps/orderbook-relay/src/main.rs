//! Order Book Relay Binary
//!
//! Starts the gateway, the health server, and the stream broker.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin orderbook-relay
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_HOST` / `RELAY_PORT`: gateway bind address (default: 0.0.0.0:8000)
//! - `RELAY_HEALTH_PORT`: health and metrics port (default: 8082)
//! - `BINANCE_STREAM_HOST`: upstream host (default: stream.binance.com:9443)
//! - `BINANCE_STREAM_MODE`: "combined" | "depth" (default: combined)
//! - `RELAY_DEPTH_LEVELS`: levels per side, 1-20 (default: 10)
//! - `RELAY_RECONNECT_DELAY_MS`: wait after a failed connect (default: 5000)
//! - `RELAY_SUBSCRIBER_BUFFER`: per-client queue length (default: 64)
//! - `RELAY_SEND_TIMEOUT_MS`: per-client enqueue timeout (default: 2000)
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: orderbook_relay=info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use orderbook_relay::infrastructure::telemetry;
use orderbook_relay::{
    BinanceConnector, ConnectorConfig, GatewayServer, GatewayState, HealthServer,
    HealthServerState, ReconnectConfig, RelayConfig, StreamBroker, TungsteniteTransport,
    init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Upper bound on connector teardown at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        otlp_export = telemetry_guard.is_exporting(),
        "Starting order book relay"
    );

    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let connector = BinanceConnector::new(
        ConnectorConfig {
            upstream: config.upstream.clone(),
            reconnect: ReconnectConfig::from_settings(&config.reconnect),
        },
        Arc::new(TungsteniteTransport::new()),
    );
    let broker = StreamBroker::new(Arc::new(connector));

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&broker),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let gateway_state = Arc::new(GatewayState::new(
        Arc::clone(&broker),
        config.delivery.clone(),
        shutdown_token.clone(),
    ));
    let gateway = GatewayServer::new(config.server.gateway_addr(), gateway_state);
    let gateway_task = tokio::spawn(gateway.run());

    tracing::info!("Order book relay ready");

    tokio::select! {
        () = await_shutdown_signal() => {}
        result = gateway_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("Gateway exited unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "Gateway failed"),
                Err(e) => tracing::error!(error = %e, "Gateway task panicked"),
            }
        }
    }

    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, broker.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Connectors did not stop in time");
    }

    tracing::info!("Order book relay stopped");
    Ok(())
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    if let Some(env_path) = cwd
        .ancestors()
        .skip(1)
        .map(|dir| dir.join(".env"))
        .find(|path| path.exists())
    {
        let _ = dotenvy::from_path(&env_path);
    }
}

fn log_config(config: &RelayConfig) {
    tracing::info!(
        gateway = %config.server.gateway_addr(),
        health_port = config.server.health_port,
        upstream = %config.upstream.host,
        mode = config.upstream.mode.as_str(),
        depth_levels = config.upstream.depth_levels,
        reconnect_delay_ms = config.reconnect.initial_delay.as_millis(),
        "Configuration loaded"
    );
}

/// Wait for SIGINT or SIGTERM.
#[allow(clippy::expect_used)]
async fn await_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}
