//! Port Interfaces
//!
//! Defines the interfaces (ports) between the stream broker and the outside
//! world following the Hexagonal Architecture pattern. Infrastructure
//! adapters implement these; the broker and its tests only see the traits.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`ConsumerSink`]: a downstream client that accepts serialized updates
//! - [`FeedTransport`]: opens a raw text stream to the exchange
//! - [`FeedConnector`]: runs one symbol's upstream feed until told to stop
//!
//! ## Driver Ports (Inbound)
//!
//! - [`FeedHandler`]: what a running connector calls back into (liveness,
//!   status, snapshot dispatch)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::domain::orderbook::{OrderBookSnapshot, Symbol};
use crate::domain::subscription::ConsumerId;

// =============================================================================
// Consumer Sink
// =============================================================================

/// A serialized update, shared between all consumers of one fan-out pass.
pub type Payload = Arc<str>;

/// Delivery failures reported by a consumer sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The consumer's connection is gone.
    #[error("consumer sink closed")]
    Closed,

    /// The consumer did not accept the update in time.
    #[error("consumer did not accept update within {0:?}")]
    Timeout(Duration),
}

/// Downstream sink for order book updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsumerSink: Send + Sync {
    /// Deliver one serialized update.
    ///
    /// # Errors
    ///
    /// Any error means the consumer is unusable; the broker evicts it and
    /// never retries the same payload.
    async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError>;
}

/// A consumer's identity together with its sink.
///
/// The connection layer owns the underlying connection; the broker only
/// keeps this handle while the subscription exists.
#[derive(Clone)]
pub struct ConsumerHandle {
    id: ConsumerId,
    sink: Arc<dyn ConsumerSink>,
}

impl ConsumerHandle {
    /// Wrap a sink under a freshly generated consumer id.
    #[must_use]
    pub fn new(sink: Arc<dyn ConsumerSink>) -> Self {
        Self::with_id(ConsumerId::new(), sink)
    }

    /// Wrap a sink under a known consumer id.
    #[must_use]
    pub fn with_id(id: ConsumerId, sink: Arc<dyn ConsumerSink>) -> Self {
        Self { id, sink }
    }

    /// Consumer identifier.
    #[must_use]
    pub const fn id(&self) -> ConsumerId {
        self.id
    }

    /// Shared sink reference.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn ConsumerSink> {
        Arc::clone(&self.sink)
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Feed Transport
// =============================================================================

/// Raw text frames from an upstream connection. The stream ends when the
/// connection closes.
pub type FeedStream = BoxStream<'static, Result<String, TransportError>>;

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, refusal, handshake).
    #[error("connect failed: {0}")]
    Connect(String),

    /// The established connection broke.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Opens upstream connections.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Connect to `url` and return its frame stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the connection cannot be
    /// established.
    async fn connect(&self, url: &str) -> Result<FeedStream, TransportError>;
}

// =============================================================================
// Feed Connector
// =============================================================================

/// Connection status transitions reported by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Upstream connection established.
    Connected,
    /// Upstream connection lost or could not be opened.
    Disconnected,
    /// Waiting before another connect attempt.
    Reconnecting {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },
}

/// Why a connector stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorExit {
    /// The broker cancelled the connector.
    Cancelled,
    /// The liveness check found no subscribers.
    NoSubscribers,
    /// A bounded reconnect policy gave up.
    RetriesExhausted,
}

/// Callbacks a running connector uses to reach the broker.
#[async_trait]
pub trait FeedHandler: Send + Sync {
    /// Whether anyone is still subscribed to `symbol`.
    fn has_subscribers(&self, symbol: &Symbol) -> bool;

    /// Record a connection status change.
    fn on_status(&self, symbol: &Symbol, status: FeedStatus);

    /// Fan a snapshot out to the symbol's subscribers.
    async fn dispatch(&self, symbol: &Symbol, snapshot: OrderBookSnapshot);
}

/// Runs the upstream feed for one symbol.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Run until `cancel` fires or `handler` reports no subscribers.
    ///
    /// Failures are handled internally; the return value only says why the
    /// connector stopped.
    async fn run(
        &self,
        symbol: Symbol,
        handler: Arc<dyn FeedHandler>,
        cancel: CancellationToken,
    ) -> ConnectorExit;
}
