//! Channel-backed consumer sink.
//!
//! Each WebSocket client gets a bounded channel. The broker pushes into the
//! sender; the client's socket task drains the receiver. A client that stops
//! draining fills its channel and, after the send timeout, is evicted.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::application::ports::{ConsumerSink, DeliveryError, Payload};

/// [`ConsumerSink`] writing into a bounded `mpsc` channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Payload>,
    send_timeout: Duration,
}

impl ChannelSink {
    /// Create a sink and the receiver its client task should drain.
    #[must_use]
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, send_timeout }, rx)
    }
}

#[async_trait]
impl ConsumerSink for ChannelSink {
    async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        match self.tx.send_timeout(payload, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
            Err(SendTimeoutError::Timeout(_)) => Err(DeliveryError::Timeout(self.send_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn delivered_payload_reaches_receiver() {
        let (sink, mut rx) = ChannelSink::channel(4, Duration::from_millis(50));

        assert_ok!(sink.deliver(Arc::from("hello")).await);

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn dropped_receiver_is_closed() {
        let (sink, rx) = ChannelSink::channel(4, Duration::from_millis(50));
        drop(rx);

        let err = assert_err!(sink.deliver(Arc::from("x")).await);
        assert_eq!(err, DeliveryError::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_times_out() {
        let (sink, _rx) = ChannelSink::channel(1, Duration::from_millis(100));
        sink.deliver(Arc::from("first")).await.unwrap();

        let err = sink.deliver(Arc::from("second")).await.unwrap_err();
        assert_eq!(err, DeliveryError::Timeout(Duration::from_millis(100)));
    }
}
