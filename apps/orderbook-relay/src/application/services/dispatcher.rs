//! Fan-out delivery of order book snapshots.
//!
//! One pass serializes the snapshot once, walks a copy of the symbol's
//! membership in order, and collects every consumer whose delivery failed.
//! Failed consumers are removed only after the pass so the remaining
//! consumers still receive the update.

use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::{ConsumerSink, Payload};
use crate::domain::orderbook::OrderBookSnapshot;
use crate::domain::subscription::{ConsumerId, SubscriberRegistry};
use crate::infrastructure::metrics;

/// Registry of shared consumer sinks for one symbol.
pub type SinkRegistry = SubscriberRegistry<Arc<dyn ConsumerSink>>;

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Consumers that accepted the update.
    pub delivered: usize,
    /// Consumers removed because delivery failed.
    pub evicted: Vec<ConsumerId>,
}

impl FanOutReport {
    /// Whether any consumer was evicted during the pass.
    #[must_use]
    pub fn has_evictions(&self) -> bool {
        !self.evicted.is_empty()
    }
}

/// Delivers snapshots to a symbol's subscribers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutDispatcher;

impl FanOutDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serialize `snapshot` and deliver it to every current subscriber.
    pub async fn dispatch(
        &self,
        registry: &SinkRegistry,
        snapshot: &OrderBookSnapshot,
    ) -> FanOutReport {
        let payload: Payload = match serde_json::to_string(snapshot) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(symbol = %snapshot.symbol, error = %e, "Failed to serialize snapshot");
                return FanOutReport::default();
            }
        };
        self.deliver(registry, payload).await
    }

    /// Deliver an already serialized payload to every current subscriber.
    pub async fn deliver(&self, registry: &SinkRegistry, payload: Payload) -> FanOutReport {
        let started = Instant::now();
        let mut report = FanOutReport::default();

        for (consumer, sink) in registry.snapshot() {
            match sink.deliver(Arc::clone(&payload)).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(consumer_id = %consumer, error = %e, "Delivery failed, evicting consumer");
                    report.evicted.push(consumer);
                }
            }
        }

        let removed = registry.remove_all(&report.evicted);
        metrics::record_snapshots_delivered(report.delivered);
        metrics::record_consumers_evicted(removed);
        metrics::record_fanout_duration(started.elapsed());

        report
    }
}
