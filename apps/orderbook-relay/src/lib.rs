#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Order Book Relay - Per-Symbol Depth Stream Multiplexer
//!
//! A WebSocket relay that keeps at most one Binance depth connection per
//! symbol, no matter how many downstream clients watch that symbol, and fans
//! every order book snapshot out to all of them.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `orderbook`: symbols, price levels, snapshots and snapshot assembly
//!   - `subscription`: consumer identifiers and per-symbol registries
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: consumer sinks, upstream transports and connectors
//!   - `services`: the stream broker and fan-out dispatcher
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: wire types, codec, reconnect policy, transport, connector
//!   - `gateway`: downstream WebSocket endpoint
//!   - `config`: environment configuration
//!   - `health`, `metrics`, `telemetry`: operations surface
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐      ┌─────────────┐
//! Binance WS (BTC) ─►│  Connector   │─────►│             │──► Client 1
//!                    └──────────────┘      │   Stream    │──► Client 2
//!                    ┌──────────────┐      │   Broker    │
//! Binance WS (ETH) ─►│  Connector   │─────►│             │──► Client N
//!                    └──────────────┘      └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core order book and subscription types.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::orderbook::{BookAssembler, OrderBookSnapshot, PriceLevel, Symbol, SymbolError};
pub use domain::subscription::{ConsumerId, SubscriberRegistry, SubscriptionStats};

// Ports and services
pub use application::ports::{
    ConnectorExit, ConsumerHandle, ConsumerSink, DeliveryError, FeedConnector, FeedHandler,
    FeedStatus, FeedStream, FeedTransport, Payload, TransportError,
};
pub use application::services::{FanOutDispatcher, FanOutReport, StreamBroker, StreamState};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, DeliverySettings, ReconnectSettings, RelayConfig, ServerSettings, StreamMode,
    UpstreamSettings,
};

// Upstream adapters
pub use infrastructure::binance::{
    BinanceConnector, ConnectorConfig, ReconnectConfig, TungsteniteTransport,
};

// Servers
pub use infrastructure::gateway::{ChannelSink, GatewayError, GatewayServer, GatewayState};
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
