//! Stream Broker
//!
//! Owns one stream per subscribed symbol. The first subscriber of a symbol
//! starts an upstream connector; removing the last subscriber (by
//! unsubscribe or eviction) cancels it. At most one connector runs per
//! symbol at any time: a replacement connector waits for its predecessor
//! to finish before it connects.
//!
//! # Locking
//!
//! Two locks guard a stream: the broker-wide stream map and the stream's
//! lifecycle mutex. When both are needed the map is taken first. Neither is
//! held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatcher::{FanOutDispatcher, SinkRegistry};
use crate::application::ports::{
    ConnectorExit, ConsumerHandle, FeedConnector, FeedHandler, FeedStatus,
};
use crate::domain::orderbook::{OrderBookSnapshot, Symbol};
use crate::domain::subscription::{ConsumerId, SubscriptionStats};
use crate::infrastructure::metrics;

// =============================================================================
// Stream State
// =============================================================================

/// Lifecycle state of a symbol's upstream stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// No stream exists for the symbol.
    Absent,
    /// A connector is running but has no upstream connection yet, either
    /// before the first connect or while reconnecting.
    Starting,
    /// The connector holds a live upstream connection.
    Running,
    /// The connector was told to stop and is winding down.
    Stopping,
}

impl StreamState {
    /// Lowercase name used in logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

/// Point-in-time view of one symbol's stream, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Normalized symbol.
    pub symbol: Symbol,
    /// Lifecycle state.
    pub state: StreamState,
    /// Whether the upstream connection is currently up.
    pub connected: bool,
    /// Number of subscribers.
    pub subscribers: usize,
    /// Snapshots dispatched since the stream was created.
    pub snapshots_dispatched: u64,
    /// Upstream disconnects since the stream was created.
    pub reconnects: u64,
}

// =============================================================================
// Per-Symbol Stream
// =============================================================================

struct ConnectorTask {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectorTask {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

struct Lifecycle {
    state: StreamState,
    task: Option<ConnectorTask>,
}

impl Lifecycle {
    fn has_live_task(&self) -> bool {
        self.task.as_ref().is_some_and(ConnectorTask::is_live)
    }

    fn task_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.handle.is_finished())
    }
}

struct SymbolStream {
    symbol: Symbol,
    subscribers: SinkRegistry,
    lifecycle: Mutex<Lifecycle>,
    connected: AtomicBool,
    snapshots: AtomicU64,
    reconnects: AtomicU64,
}

impl SymbolStream {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            subscribers: SinkRegistry::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: StreamState::Absent,
                task: None,
            }),
            connected: AtomicBool::new(false),
            snapshots: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    fn status(&self) -> StreamStatus {
        StreamStatus {
            symbol: self.symbol.clone(),
            state: self.lifecycle.lock().state,
            connected: self.connected.load(Ordering::Relaxed),
            subscribers: self.subscribers.len(),
            snapshots_dispatched: self.snapshots.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Broker
// =============================================================================

/// Per-symbol stream broker.
///
/// Create with [`StreamBroker::new`]; the broker is always shared behind an
/// [`Arc`] because running connectors call back into it.
pub struct StreamBroker {
    connector: Arc<dyn FeedConnector>,
    dispatcher: FanOutDispatcher,
    streams: RwLock<HashMap<Symbol, Arc<SymbolStream>>>,
    shutdown: CancellationToken,
    next_task_id: AtomicU64,
}

impl StreamBroker {
    /// Create a broker that runs `connector` for each subscribed symbol.
    #[must_use]
    pub fn new(connector: Arc<dyn FeedConnector>) -> Arc<Self> {
        Arc::new(Self {
            connector,
            dispatcher: FanOutDispatcher::new(),
            streams: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            next_task_id: AtomicU64::new(1),
        })
    }

    /// Register `consumer` for `symbol`, starting the upstream stream if
    /// none is running.
    ///
    /// Returns `false` when the consumer was already registered or the
    /// broker is shutting down.
    pub fn subscribe(self: &Arc<Self>, symbol: &Symbol, consumer: ConsumerHandle) -> bool {
        if self.shutdown.is_cancelled() {
            tracing::warn!(%symbol, consumer_id = %consumer.id(), "Rejecting subscription during shutdown");
            return false;
        }

        let (stream, added) = {
            let mut streams = self.streams.write();
            let stream = Arc::clone(
                streams
                    .entry(symbol.clone())
                    .or_insert_with(|| Arc::new(SymbolStream::new(symbol.clone()))),
            );
            let added = stream.subscribers.add(consumer.id(), consumer.sink());
            (stream, added)
        };

        if added {
            tracing::info!(
                %symbol,
                consumer_id = %consumer.id(),
                subscribers = stream.subscribers.len(),
                "Consumer subscribed"
            );
        }

        self.ensure_connector(&stream);
        self.publish_gauges();
        added
    }

    /// Remove `consumer` from `symbol`. Stops the upstream stream if it was
    /// the last subscriber.
    ///
    /// Returns `false` if the consumer was not subscribed.
    pub fn unsubscribe(&self, symbol: &Symbol, consumer: ConsumerId) -> bool {
        let Some(stream) = self.streams.read().get(symbol).cloned() else {
            return false;
        };

        let removed = stream.subscribers.remove(consumer);
        if removed {
            tracing::info!(
                %symbol,
                consumer_id = %consumer,
                subscribers = stream.subscribers.len(),
                "Consumer unsubscribed"
            );
        }

        self.release_if_idle(&stream);
        self.publish_gauges();
        removed
    }

    /// Cancel every connector and wait for them to finish.
    ///
    /// Subscriptions are dropped; later calls to [`subscribe`](Self::subscribe)
    /// are rejected.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles: Vec<_> = {
            let streams = self.streams.read();
            streams
                .values()
                .filter_map(|stream| {
                    let mut lifecycle = stream.lifecycle.lock();
                    lifecycle.state = StreamState::Stopping;
                    lifecycle.task.take().map(|task| task.handle)
                })
                .collect()
        };

        tracing::info!(connectors = handles.len(), "Stopping upstream connectors");
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Connector task ended abnormally");
            }
        }

        let dropped: usize = {
            let mut streams = self.streams.write();
            let count = streams.values().map(|s| s.subscribers.clear()).sum();
            streams.clear();
            count
        };
        tracing::info!(subscriptions = dropped, "Broker stopped");
        self.publish_gauges();
    }

    /// Whether new subscriptions are accepted.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Current lifecycle state for `symbol`.
    #[must_use]
    pub fn stream_state(&self, symbol: &Symbol) -> StreamState {
        self.streams
            .read()
            .get(symbol)
            .map_or(StreamState::Absent, |stream| stream.lifecycle.lock().state)
    }

    /// Number of subscribers for `symbol`.
    #[must_use]
    pub fn subscriber_count(&self, symbol: &Symbol) -> usize {
        self.streams
            .read()
            .get(symbol)
            .map_or(0, |stream| stream.subscribers.len())
    }

    /// Number of symbols with a stream.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.streams.read().len()
    }

    /// Aggregate subscription statistics.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        let streams = self.streams.read();
        SubscriptionStats {
            symbol_count: streams.len(),
            subscriber_count: streams.values().map(|s| s.subscribers.len()).sum(),
        }
    }

    /// Status of every stream, sorted by symbol.
    #[must_use]
    pub fn stream_statuses(&self) -> Vec<StreamStatus> {
        let mut statuses: Vec<_> = self
            .streams
            .read()
            .values()
            .map(|stream| stream.status())
            .collect();
        statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        statuses
    }

    // -------------------------------------------------------------------------
    // Connector lifecycle
    // -------------------------------------------------------------------------

    fn ensure_connector(self: &Arc<Self>, stream: &Arc<SymbolStream>) {
        let mut lifecycle = stream.lifecycle.lock();
        if lifecycle.has_live_task()
            || stream.subscribers.is_empty()
            || self.shutdown.is_cancelled()
        {
            return;
        }

        let previous = lifecycle.task.take();
        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        let broker = Arc::clone(self);
        let symbol = stream.symbol.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                previous.cancel.cancel();
                if let Err(e) = previous.handle.await {
                    tracing::warn!(%symbol, error = %e, "Previous connector ended abnormally");
                }
            }

            let handler: Arc<dyn FeedHandler> = Arc::clone(&broker) as Arc<dyn FeedHandler>;
            let exit = broker
                .connector
                .run(symbol.clone(), handler, task_cancel)
                .await;
            tracing::info!(%symbol, ?exit, "Upstream connector stopped");
            broker.reap(&symbol, id, exit);
        });

        lifecycle.task = Some(ConnectorTask { id, cancel, handle });
        lifecycle.state = StreamState::Starting;
        drop(lifecycle);

        tracing::info!(symbol = %stream.symbol, task_id = id, "Started upstream connector");
    }

    /// Cancel the connector when no subscribers remain.
    fn release_if_idle(&self, stream: &Arc<SymbolStream>) {
        let mut lifecycle = stream.lifecycle.lock();
        if !stream.subscribers.is_empty() {
            return;
        }

        if let Some(task) = lifecycle.task.as_ref() {
            if !task.cancel.is_cancelled() {
                task.cancel.cancel();
                tracing::info!(symbol = %stream.symbol, "Last subscriber left, stopping upstream stream");
            }
        }

        if lifecycle.task_finished() {
            lifecycle.state = StreamState::Absent;
            drop(lifecycle);
            self.remove_if_idle(&stream.symbol);
        } else {
            lifecycle.state = StreamState::Stopping;
        }
    }

    /// Drop the map entry when it has no subscribers and no running task.
    fn remove_if_idle(&self, symbol: &Symbol) {
        let mut streams = self.streams.write();
        let Some(stream) = streams.get(symbol).cloned() else {
            return;
        };
        let idle = stream.subscribers.is_empty() && stream.lifecycle.lock().task_finished();
        if idle {
            streams.remove(symbol);
        }
    }

    /// Exit path of connector `task_id`.
    fn reap(self: &Arc<Self>, symbol: &Symbol, task_id: u64, exit: ConnectorExit) {
        let mut streams = self.streams.write();
        let Some(stream) = streams.get(symbol).cloned() else {
            return;
        };

        let mut lifecycle = stream.lifecycle.lock();
        if lifecycle.task.as_ref().is_some_and(|task| task.id != task_id) {
            // A newer connector owns the stream.
            return;
        }
        lifecycle.task = None;
        lifecycle.state = StreamState::Absent;
        stream.connected.store(false, Ordering::Relaxed);

        if exit == ConnectorExit::RetriesExhausted {
            let dropped = stream.subscribers.clear();
            tracing::error!(%symbol, subscribers = dropped, "Upstream unavailable, dropping subscribers");
        }

        if stream.subscribers.is_empty() || self.shutdown.is_cancelled() {
            drop(lifecycle);
            streams.remove(symbol);
            drop(streams);
            tracing::debug!(%symbol, "Stream removed");
        } else {
            // Subscribed after the connector's last liveness check.
            drop(lifecycle);
            drop(streams);
            self.ensure_connector(&stream);
        }
        self.publish_gauges();
    }

    fn publish_gauges(&self) {
        let stats = self.stats();
        metrics::set_active_streams(stats.symbol_count);
        metrics::set_subscribers(stats.subscriber_count);
    }
}

impl std::fmt::Debug for StreamBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBroker")
            .field("active_streams", &self.active_streams())
            .field("accepting", &self.is_accepting())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connector Callbacks
// =============================================================================

#[async_trait]
impl FeedHandler for StreamBroker {
    fn has_subscribers(&self, symbol: &Symbol) -> bool {
        self.streams
            .read()
            .get(symbol)
            .is_some_and(|stream| !stream.subscribers.is_empty())
    }

    fn on_status(&self, symbol: &Symbol, status: FeedStatus) {
        let Some(stream) = self.streams.read().get(symbol).cloned() else {
            return;
        };

        match status {
            FeedStatus::Connected => {
                stream.connected.store(true, Ordering::Relaxed);
                let mut lifecycle = stream.lifecycle.lock();
                if lifecycle.state == StreamState::Starting {
                    lifecycle.state = StreamState::Running;
                }
            }
            FeedStatus::Disconnected => {
                if stream.connected.swap(false, Ordering::Relaxed) {
                    stream.reconnects.fetch_add(1, Ordering::Relaxed);
                }
                let mut lifecycle = stream.lifecycle.lock();
                if lifecycle.state == StreamState::Running {
                    lifecycle.state = StreamState::Starting;
                }
            }
            FeedStatus::Reconnecting { attempt } => {
                tracing::debug!(%symbol, attempt, "Upstream reconnect scheduled");
            }
        }
    }

    async fn dispatch(&self, symbol: &Symbol, snapshot: OrderBookSnapshot) {
        let Some(stream) = self.streams.read().get(symbol).cloned() else {
            tracing::trace!(%symbol, "Dropping snapshot for unknown stream");
            return;
        };

        stream.snapshots.fetch_add(1, Ordering::Relaxed);
        let report = self.dispatcher.dispatch(&stream.subscribers, &snapshot).await;

        if report.has_evictions() {
            tracing::info!(
                %symbol,
                evicted = report.evicted.len(),
                remaining = stream.subscribers.len(),
                "Evicted unresponsive consumers"
            );
            self.release_if_idle(&stream);
            self.publish_gauges();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::application::ports::{ConsumerSink, DeliveryError, MockConsumerSink};

    /// Connector that stays up until cancelled.
    #[derive(Default)]
    struct IdleConnector {
        runs: AtomicUsize,
        running: AtomicUsize,
    }

    #[async_trait]
    impl FeedConnector for IdleConnector {
        async fn run(
            &self,
            symbol: Symbol,
            handler: Arc<dyn FeedHandler>,
            cancel: CancellationToken,
        ) -> ConnectorExit {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.running.fetch_add(1, Ordering::SeqCst);
            handler.on_status(&symbol, FeedStatus::Connected);
            cancel.cancelled().await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            ConnectorExit::Cancelled
        }
    }

    fn btc() -> Symbol {
        Symbol::parse("btcusdt").unwrap()
    }

    fn sink() -> Arc<dyn ConsumerSink> {
        let mut sink = MockConsumerSink::new();
        sink.expect_deliver().returning(|_| Ok(()));
        Arc::new(sink)
    }

    async fn settle<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn first_subscriber_starts_stream() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());

        assert_eq!(broker.stream_state(&btc()), StreamState::Absent);
        assert!(broker.subscribe(&btc(), ConsumerHandle::new(sink())));

        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;
        assert_eq!(connector.runs.load(Ordering::SeqCst), 1);
        assert_eq!(broker.active_streams(), 1);
    }

    #[tokio::test]
    async fn second_subscriber_shares_stream() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());

        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;

        assert_eq!(connector.runs.load(Ordering::SeqCst), 1);
        assert_eq!(broker.subscriber_count(&btc()), 2);
    }

    #[tokio::test]
    async fn duplicate_consumer_is_not_added_twice() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        let consumer = ConsumerHandle::new(sink());

        assert!(broker.subscribe(&btc(), consumer.clone()));
        assert!(!broker.subscribe(&btc(), consumer));
        assert_eq!(broker.subscriber_count(&btc()), 1);
    }

    #[tokio::test]
    async fn last_unsubscribe_stops_stream() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());
        let a = ConsumerHandle::new(sink());
        let b = ConsumerHandle::new(sink());
        broker.subscribe(&btc(), a.clone());
        broker.subscribe(&btc(), b.clone());
        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;

        assert!(broker.unsubscribe(&btc(), a.id()));
        assert_eq!(broker.stream_state(&btc()), StreamState::Running);

        assert!(broker.unsubscribe(&btc(), b.id()));
        settle(|| broker.stream_state(&btc()) == StreamState::Absent).await;
        assert_eq!(connector.running.load(Ordering::SeqCst), 0);
        assert_eq!(broker.active_streams(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_consumer_is_noop() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        assert!(!broker.unsubscribe(&btc(), ConsumerId::new()));

        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        assert!(!broker.unsubscribe(&btc(), ConsumerId::new()));
        assert_eq!(broker.subscriber_count(&btc()), 1);
    }

    #[tokio::test]
    async fn resubscribe_after_teardown_starts_fresh_stream() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());
        let first = ConsumerHandle::new(sink());

        broker.subscribe(&btc(), first.clone());
        settle(|| connector.running.load(Ordering::SeqCst) == 1).await;
        broker.unsubscribe(&btc(), first.id());
        settle(|| broker.stream_state(&btc()) == StreamState::Absent).await;

        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;
        assert_eq!(connector.runs.load(Ordering::SeqCst), 2);
        assert_eq!(connector.running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_eviction_of_last_consumer_stops_stream() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());
        let mut failing = MockConsumerSink::new();
        failing
            .expect_deliver()
            .times(1)
            .returning(|_| Err(DeliveryError::Closed));
        broker.subscribe(&btc(), ConsumerHandle::new(Arc::new(failing)));
        settle(|| connector.running.load(Ordering::SeqCst) == 1).await;

        let snapshot = OrderBookSnapshot {
            symbol: btc(),
            last_update_id: 1,
            bids: vec![],
            asks: vec![],
            last_price: None,
        };
        broker.dispatch(&btc(), snapshot).await;

        assert_eq!(broker.subscriber_count(&btc()), 0);
        settle(|| broker.stream_state(&btc()) == StreamState::Absent).await;
    }

    #[tokio::test]
    async fn has_subscribers_tracks_membership() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        let consumer = ConsumerHandle::new(sink());
        assert!(!broker.has_subscribers(&btc()));

        broker.subscribe(&btc(), consumer.clone());
        assert!(broker.has_subscribers(&btc()));

        broker.unsubscribe(&btc(), consumer.id());
        assert!(!broker.has_subscribers(&btc()));
    }

    #[tokio::test]
    async fn stats_cover_all_symbols() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        let eth = Symbol::parse("ethusdt").unwrap();
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        broker.subscribe(&eth, ConsumerHandle::new(sink()));

        let stats = broker.stats();
        assert_eq!(stats.symbol_count, 2);
        assert_eq!(stats.subscriber_count, 3);

        let statuses = broker.stream_statuses();
        assert_eq!(statuses[0].symbol, btc());
        assert_eq!(statuses[1].symbol, eth);
    }

    #[tokio::test]
    async fn shutdown_stops_connectors_and_rejects_subscribers() {
        let connector = Arc::new(IdleConnector::default());
        let broker = StreamBroker::new(connector.clone());
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        settle(|| connector.running.load(Ordering::SeqCst) == 1).await;

        broker.shutdown().await;

        assert_eq!(connector.running.load(Ordering::SeqCst), 0);
        assert_eq!(broker.active_streams(), 0);
        assert!(!broker.is_accepting());
        assert!(!broker.subscribe(&btc(), ConsumerHandle::new(sink())));
    }

    #[tokio::test]
    async fn disconnect_moves_running_stream_back_to_starting() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;

        broker.on_status(&btc(), FeedStatus::Disconnected);
        assert_eq!(broker.stream_state(&btc()), StreamState::Starting);
        let status = broker.stream_statuses().pop().unwrap();
        assert!(!status.connected);
        assert_eq!(status.reconnects, 1);

        broker.on_status(&btc(), FeedStatus::Connected);
        assert_eq!(broker.stream_state(&btc()), StreamState::Running);
    }

    #[tokio::test]
    async fn disconnect_does_not_revive_stopping_stream() {
        let broker = StreamBroker::new(Arc::new(IdleConnector::default()));
        let consumer = ConsumerHandle::new(sink());
        broker.subscribe(&btc(), consumer.clone());
        settle(|| broker.stream_state(&btc()) == StreamState::Running).await;

        {
            let stream = broker.streams.read().get(&btc()).cloned().unwrap();
            stream.lifecycle.lock().state = StreamState::Stopping;
        }
        broker.on_status(&btc(), FeedStatus::Disconnected);

        assert_eq!(broker.stream_state(&btc()), StreamState::Stopping);
        broker.unsubscribe(&btc(), consumer.id());
    }

    /// Connector whose bounded retry budget is already spent.
    struct GivesUp;

    #[async_trait]
    impl FeedConnector for GivesUp {
        async fn run(
            &self,
            _symbol: Symbol,
            _handler: Arc<dyn FeedHandler>,
            _cancel: CancellationToken,
        ) -> ConnectorExit {
            ConnectorExit::RetriesExhausted
        }
    }

    #[tokio::test]
    async fn exhausted_retries_drop_subscribers_and_stream() {
        let broker = StreamBroker::new(Arc::new(GivesUp));
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));
        broker.subscribe(&btc(), ConsumerHandle::new(sink()));

        settle(|| broker.active_streams() == 0).await;

        assert_eq!(broker.subscriber_count(&btc()), 0);
        assert_eq!(broker.stream_state(&btc()), StreamState::Absent);
        assert!(broker.is_accepting());
    }

    #[test]
    fn stream_state_names() {
        assert_eq!(StreamState::Absent.as_str(), "absent");
        assert_eq!(StreamState::Running.as_str(), "running");
        assert_eq!(
            serde_json::to_string(&StreamState::Stopping).unwrap(),
            "\"stopping\""
        );
    }
}
