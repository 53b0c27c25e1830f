//! WebSocket Gateway
//!
//! Downstream HTTP surface. Each client connects to
//! `/ws/orderbook/{symbol}`, is registered with the broker through a
//! [`ChannelSink`], and receives every snapshot for that symbol as a JSON
//! text frame until either side goes away.
//!
//! # Endpoints
//!
//! - `GET /` - Service banner with the number of active streams
//! - `GET /ws/orderbook/{symbol}` - WebSocket subscription (400 on an invalid symbol)

mod sink;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use sink::ChannelSink;

use crate::application::ports::ConsumerHandle;
use crate::application::services::StreamBroker;
use crate::domain::orderbook::Symbol;
use crate::infrastructure::config::DeliverySettings;

// =============================================================================
// State
// =============================================================================

/// Shared state for gateway handlers.
pub struct GatewayState {
    broker: Arc<StreamBroker>,
    delivery: DeliverySettings,
    cancel: CancellationToken,
}

impl GatewayState {
    /// Create gateway state.
    ///
    /// `cancel` closes every client connection when triggered.
    #[must_use]
    pub const fn new(
        broker: Arc<StreamBroker>,
        delivery: DeliverySettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            broker,
            delivery,
            cancel,
        }
    }
}

/// Root endpoint body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBanner {
    /// Service name.
    pub message: &'static str,
    /// Always "running" while the server answers.
    pub status: &'static str,
    /// Symbols with an upstream stream.
    pub active_streams: usize,
}

// =============================================================================
// Server
// =============================================================================

/// Gateway HTTP server.
pub struct GatewayServer {
    addr: String,
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Create a server that will bind `addr` (`host:port`).
    #[must_use]
    pub fn new(addr: impl Into<String>, state: Arc<GatewayState>) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    /// Bind and serve until the state's cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if binding fails or the server stops with an
    /// I/O error.
    pub async fn run(self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| GatewayError::BindFailed(self.addr.clone(), e.to_string()))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ServerFailed` if the server stops with an I/O
    /// error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), GatewayError> {
        let local_addr: Option<SocketAddr> = listener.local_addr().ok();
        tracing::info!(addr = ?local_addr, "Gateway listening");

        let cancel = self.state.cancel.clone();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| GatewayError::ServerFailed(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Gateway routes with CORS and request tracing.
#[must_use]
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/ws/orderbook/{symbol}", get(orderbook_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

async fn root_handler(State(state): State<Arc<GatewayState>>) -> Json<ServiceBanner> {
    Json(ServiceBanner {
        message: "Binance Order Book Relay",
        status: "running",
        active_streams: state.broker.active_streams(),
    })
}

async fn orderbook_handler(
    ws: WebSocketUpgrade,
    Path(raw_symbol): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    match Symbol::parse(&raw_symbol) {
        Ok(symbol) => ws.on_upgrade(move |socket| serve_client(socket, symbol, state)),
        Err(e) => {
            tracing::debug!(symbol = %raw_symbol, error = %e, "Rejecting subscription");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn serve_client(socket: WebSocket, symbol: Symbol, state: Arc<GatewayState>) {
    let (sink, mut updates) =
        ChannelSink::channel(state.delivery.buffer, state.delivery.send_timeout);
    let consumer = ConsumerHandle::new(Arc::new(sink));
    let consumer_id = consumer.id();

    let (mut outbound, mut inbound) = socket.split();

    if !state.broker.subscribe(&symbol, consumer) {
        let _ = outbound.send(Message::Close(None)).await;
        return;
    }
    tracing::info!(%symbol, %consumer_id, "Client connected");

    loop {
        tokio::select! {
            () = state.cancel.cancelled() => {
                let _ = outbound.send(Message::Close(None)).await;
                break;
            }
            update = updates.recv() => {
                let Some(payload) = update else {
                    tracing::debug!(%symbol, %consumer_id, "Subscription dropped by broker");
                    let _ = outbound.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = outbound.send(Message::Text(payload.as_ref().into())).await {
                    tracing::debug!(%symbol, %consumer_id, error = %e, "Client write failed");
                    break;
                }
            }
            incoming = inbound.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%symbol, %consumer_id, error = %e, "Client read failed");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    state.broker.unsubscribe(&symbol, consumer_id);
    tracing::info!(%symbol, %consumer_id, "Client disconnected");
}

// =============================================================================
// Errors
// =============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind the listen address.
    #[error("failed to bind {0}: {1}")]
    BindFailed(String, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
