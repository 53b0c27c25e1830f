//! Binance Stream Adapters
//!
//! Everything that knows about the exchange's public market streams:
//!
//! - **messages**: depth, ticker and combined-envelope wire types
//! - **codec**: text frame to [`FeedEvent`] decoding
//! - **reconnect**: connect retry schedule
//! - **transport**: `tokio-tungstenite` WebSocket transport
//! - **connector**: per-symbol feed loop driving the broker

pub mod codec;
pub mod connector;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use codec::{CodecError, FeedEvent, JsonCodec};
pub use connector::{BinanceConnector, ConnectorConfig};
pub use messages::{CombinedEnvelope, DepthPayload, StreamKind, TickerPayload};
pub use reconnect::{DEFAULT_RECONNECT_DELAY, ReconnectConfig, ReconnectPolicy};
pub use transport::TungsteniteTransport;
