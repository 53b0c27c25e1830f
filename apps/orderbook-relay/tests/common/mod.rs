//! Shared fixtures for integration tests: a scripted upstream transport and
//! recording consumer sinks.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use orderbook_relay::{
    BinanceConnector, ConnectorConfig, ConsumerSink, DeliveryError, FeedStream, FeedTransport,
    Payload, ReconnectConfig, StreamBroker, TransportError, UpstreamSettings,
};

// =============================================================================
// Scripted Transport
// =============================================================================

/// In-memory upstream. Each successful connect opens a channel the test can
/// push frames into; dropping the channel ends the connection.
#[derive(Default)]
pub struct ScriptedTransport {
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
    urls: Mutex<Vec<String>>,
    links: Mutex<VecDeque<mpsc::UnboundedSender<Result<String, TransportError>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Connect attempts so far, failed ones included.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Connections currently open.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Most connections ever open at the same time.
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Send a frame on the most recent connection.
    pub fn push(&self, frame: &str) {
        if let Some(link) = self.links.lock().back() {
            let _ = link.send(Ok(frame.to_string()));
        }
    }

    /// Fail the most recent connection with a stream error.
    pub fn break_connection(&self) {
        if let Some(link) = self.links.lock().pop_back() {
            let _ = link.send(Err(TransportError::Stream("reset by peer".to_string())));
        }
    }

    /// Close the most recent connection cleanly.
    pub fn close_connection(&self) {
        self.links.lock().pop_back();
    }
}

struct OpenGuard {
    open: Arc<AtomicUsize>,
}

impl OpenGuard {
    fn new(open: Arc<AtomicUsize>, max_open: &AtomicUsize) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        max_open.fetch_max(now, Ordering::SeqCst);
        Self { open }
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn connect(&self, url: &str) -> Result<FeedStream, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.links.lock().push_back(tx);
        let guard = OpenGuard::new(Arc::clone(&self.open), &self.max_open);
        let frames = UnboundedReceiverStream::new(rx).map(move |frame| {
            let _ = &guard;
            frame
        });
        Ok(frames.boxed())
    }
}

// =============================================================================
// Consumer Sinks
// =============================================================================

/// Sink that records every payload and can be switched to failing.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Parsed JSON of the `index`th payload.
    pub fn json(&self, index: usize) -> serde_json::Value {
        serde_json::from_str(&self.received.lock()[index]).unwrap()
    }
}

#[async_trait]
impl ConsumerSink for RecordingSink {
    async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Closed);
        }
        self.received.lock().push(payload.to_string());
        Ok(())
    }
}

// =============================================================================
// Builders and Helpers
// =============================================================================

/// Broker wired to `transport` with a short reconnect delay.
pub fn broker_with(transport: &Arc<ScriptedTransport>, reconnect_delay: Duration) -> Arc<StreamBroker> {
    let connector = BinanceConnector::new(
        ConnectorConfig {
            upstream: UpstreamSettings::default(),
            reconnect: ReconnectConfig::fixed(reconnect_delay),
        },
        Arc::clone(transport) as Arc<dyn FeedTransport>,
    );
    StreamBroker::new(Arc::new(connector))
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

/// Combined-stream depth frame.
pub fn depth_frame(symbol: &str, last_update_id: u64, levels: usize) -> String {
    let side: Vec<_> = (0..levels)
        .map(|i| serde_json::json!([format!("{}.00", 100 + i), "1.0"]))
        .collect();
    serde_json::json!({
        "stream": format!("{}@depth20@100ms", symbol.to_lowercase()),
        "data": { "lastUpdateId": last_update_id, "bids": side, "asks": side },
    })
    .to_string()
}

/// Combined-stream ticker frame.
pub fn ticker_frame(symbol: &str, last_price: &str) -> String {
    serde_json::json!({
        "stream": format!("{}@ticker", symbol.to_lowercase()),
        "data": { "e": "24hrTicker", "s": symbol.to_uppercase(), "c": last_price },
    })
    .to_string()
}
