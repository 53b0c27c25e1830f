//! Binance Feed Connector
//!
//! Runs one symbol's upstream connection: connect, decode frames, assemble
//! snapshots, hand them to the broker, and reconnect when the connection
//! drops. The connector stops when it is cancelled or when it observes that
//! the symbol has no subscribers left.
//!
//! # Reconnect Behavior
//!
//! - A failed connect waits for the reconnect policy's delay.
//! - An established connection that ends or errors reconnects immediately.
//! - Malformed frames are logged and skipped; they never end the connection.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ConnectorExit, FeedConnector, FeedHandler, FeedStatus, FeedStream, FeedTransport,
};
use crate::domain::orderbook::{BookAssembler, Symbol};
use crate::infrastructure::binance::codec::{FeedEvent, JsonCodec};
use crate::infrastructure::binance::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::config::UpstreamSettings;
use crate::infrastructure::metrics::{self, UpstreamMessageKind};

/// Connector configuration.
#[derive(Debug, Clone, Default)]
pub struct ConnectorConfig {
    /// Upstream host, stream mode and depth.
    pub upstream: UpstreamSettings,
    /// Connect retry schedule.
    pub reconnect: ReconnectConfig,
}

/// [`FeedConnector`] for Binance partial depth streams.
pub struct BinanceConnector {
    config: ConnectorConfig,
    transport: Arc<dyn FeedTransport>,
    codec: JsonCodec,
}

enum SessionEnd {
    Exit(ConnectorExit),
    Dropped,
}

impl BinanceConnector {
    /// Create a connector that opens connections through `transport`.
    #[must_use]
    pub fn new(config: ConnectorConfig, transport: Arc<dyn FeedTransport>) -> Self {
        Self {
            config,
            transport,
            codec: JsonCodec::new(),
        }
    }

    async fn run_session(
        &self,
        symbol: &Symbol,
        mut frames: FeedStream,
        assembler: &mut BookAssembler,
        handler: &dyn FeedHandler,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        loop {
            if !handler.has_subscribers(symbol) {
                tracing::info!(%symbol, "No subscribers left, closing upstream connection");
                return SessionEnd::Exit(ConnectorExit::NoSubscribers);
            }

            let frame = tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Exit(ConnectorExit::Cancelled),
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(text)) => self.handle_frame(symbol, &text, assembler, handler).await,
                Some(Err(e)) => {
                    tracing::warn!(%symbol, error = %e, "Upstream connection failed");
                    metrics::record_reconnect("error");
                    return SessionEnd::Dropped;
                }
                None => {
                    tracing::info!(%symbol, "Upstream connection closed");
                    metrics::record_reconnect("closed");
                    return SessionEnd::Dropped;
                }
            }
        }
    }

    async fn handle_frame(
        &self,
        symbol: &Symbol,
        text: &str,
        assembler: &mut BookAssembler,
        handler: &dyn FeedHandler,
    ) {
        match self.codec.decode(text) {
            Ok(FeedEvent::Depth(depth)) => {
                metrics::record_upstream_message(UpstreamMessageKind::Depth);
                let snapshot = assembler.assemble(depth.last_update_id, depth.bids, depth.asks);
                handler.dispatch(symbol, snapshot).await;
            }
            Ok(FeedEvent::Ticker(ticker)) => {
                metrics::record_upstream_message(UpstreamMessageKind::Ticker);
                assembler.record_last_price(ticker.last_price);
            }
            Ok(FeedEvent::Ignored(stream)) => {
                metrics::record_upstream_message(UpstreamMessageKind::Other);
                tracing::trace!(%symbol, %stream, "Ignoring message from unused stream");
            }
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(%symbol, error = %e, "Dropping malformed upstream message");
            }
        }
    }
}

impl std::fmt::Debug for BinanceConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FeedConnector for BinanceConnector {
    async fn run(
        &self,
        symbol: Symbol,
        handler: Arc<dyn FeedHandler>,
        cancel: CancellationToken,
    ) -> ConnectorExit {
        let url = self.config.upstream.stream_url(&symbol);
        let mut assembler = BookAssembler::new(
            symbol.clone(),
            self.config.upstream.depth_levels,
            self.config.upstream.mode.tracks_last_price(),
        );
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if cancel.is_cancelled() {
                return ConnectorExit::Cancelled;
            }
            if !handler.has_subscribers(&symbol) {
                return ConnectorExit::NoSubscribers;
            }

            tracing::info!(%symbol, %url, "Connecting to upstream stream");
            let connected = tokio::select! {
                () = cancel.cancelled() => return ConnectorExit::Cancelled,
                result = self.transport.connect(&url) => result,
            };

            match connected {
                Ok(frames) => {
                    reconnect_policy.reset();
                    handler.on_status(&symbol, FeedStatus::Connected);
                    tracing::info!(%symbol, "Upstream stream connected");

                    let end = self
                        .run_session(&symbol, frames, &mut assembler, handler.as_ref(), &cancel)
                        .await;
                    handler.on_status(&symbol, FeedStatus::Disconnected);
                    if let SessionEnd::Exit(exit) = end {
                        return exit;
                    }
                }
                Err(e) => {
                    metrics::record_connect_error();
                    handler.on_status(&symbol, FeedStatus::Disconnected);

                    let Some(delay) = reconnect_policy.next_delay() else {
                        tracing::error!(
                            %symbol,
                            attempts = reconnect_policy.attempt_count(),
                            error = %e,
                            "Giving up on upstream stream"
                        );
                        return ConnectorExit::RetriesExhausted;
                    };
                    let attempt = reconnect_policy.attempt_count();
                    tracing::warn!(
                        %symbol,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Upstream connect failed, retrying"
                    );
                    handler.on_status(&symbol, FeedStatus::Reconnecting { attempt });
                    metrics::record_reconnect("connect_failed");

                    tokio::select! {
                        () = cancel.cancelled() => return ConnectorExit::Cancelled,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
