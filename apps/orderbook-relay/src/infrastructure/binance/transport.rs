//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Exposes an upstream connection as a stream of text frames. Pings are
//! answered inline; binary frames are passed on when they hold UTF-8.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::application::ports::{FeedStream, FeedTransport, TransportError};

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport for Binance streams.
#[derive(Debug, Default, Clone)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Create a transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<FeedStream, TransportError> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(%url, status = %response.status(), "Upstream handshake complete");
        Ok(text_frames(socket).boxed())
    }
}

fn text_frames(
    socket: UpstreamSocket,
) -> impl futures_util::Stream<Item = Result<String, TransportError>> + Send + 'static {
    stream::unfold(Some(socket), |state| async move {
        let mut socket = state?;
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some((Ok(text.as_str().to_owned()), Some(socket)));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some((Ok(text), Some(socket))),
                    Err(_) => tracing::debug!("Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = socket.send(Message::Pong(payload)).await {
                        return Some((Err(TransportError::Stream(e.to_string())), None));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Upstream sent close frame");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some((Err(TransportError::Stream(e.to_string())), None)),
                None => return None,
            }
        }
    })
}
