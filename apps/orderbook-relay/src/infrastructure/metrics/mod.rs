//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Upstream**: messages received by kind, decode errors, connect errors,
//!   reconnects by reason
//! - **Fan-out**: snapshots delivered, consumers evicted, pass duration
//! - **Streams**: active symbol streams and total subscribers
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! functions are no-ops until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder was already installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");
            describe_metrics();
            handle
        })
        .clone()
}

/// Prometheus handle for rendering, if metrics are initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn describe_metrics() {
    describe_counter!(
        "orderbook_relay_upstream_messages_total",
        "Messages received from Binance by kind"
    );
    describe_counter!(
        "orderbook_relay_decode_errors_total",
        "Upstream frames dropped as malformed"
    );
    describe_counter!(
        "orderbook_relay_upstream_connect_errors_total",
        "Failed upstream connect attempts"
    );
    describe_counter!(
        "orderbook_relay_reconnects_total",
        "Upstream reconnects by reason"
    );

    describe_counter!(
        "orderbook_relay_snapshots_delivered_total",
        "Snapshots accepted by consumers"
    );
    describe_counter!(
        "orderbook_relay_consumers_evicted_total",
        "Consumers removed after a failed delivery"
    );
    describe_histogram!(
        "orderbook_relay_fanout_seconds",
        "Time to deliver one snapshot to all subscribers"
    );

    describe_gauge!(
        "orderbook_relay_active_streams",
        "Symbols with an upstream stream"
    );
    describe_gauge!(
        "orderbook_relay_subscribers",
        "Subscriptions across all symbols"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Label for upstream message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMessageKind {
    /// Partial depth update.
    Depth,
    /// Ticker update.
    Ticker,
    /// Message from a stream the relay ignores.
    Other,
}

impl UpstreamMessageKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Ticker => "ticker",
            Self::Other => "other",
        }
    }
}

/// Record a decoded upstream message.
pub fn record_upstream_message(kind: UpstreamMessageKind) {
    counter!("orderbook_relay_upstream_messages_total", "kind" => kind.as_str()).increment(1);
}

/// Record a malformed upstream frame.
pub fn record_decode_error() {
    counter!("orderbook_relay_decode_errors_total").increment(1);
}

/// Record a failed upstream connect.
pub fn record_connect_error() {
    counter!("orderbook_relay_upstream_connect_errors_total").increment(1);
}

/// Record an upstream reconnect.
pub fn record_reconnect(reason: &'static str) {
    counter!("orderbook_relay_reconnects_total", "reason" => reason).increment(1);
}

/// Record successful deliveries from one fan-out pass.
pub fn record_snapshots_delivered(count: usize) {
    if count > 0 {
        counter!("orderbook_relay_snapshots_delivered_total").increment(as_u64(count));
    }
}

/// Record consumers evicted in one fan-out pass.
pub fn record_consumers_evicted(count: usize) {
    if count > 0 {
        counter!("orderbook_relay_consumers_evicted_total").increment(as_u64(count));
    }
}

/// Record the duration of one fan-out pass.
pub fn record_fanout_duration(duration: Duration) {
    histogram!("orderbook_relay_fanout_seconds").record(duration.as_secs_f64());
}

/// Update the active stream count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_streams(count: usize) {
    gauge!("orderbook_relay_active_streams").set(count as f64);
}

/// Update the total subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("orderbook_relay_subscribers").set(count as f64);
}

fn as_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

// =============================================================================
// Tests
// =============================================================================
