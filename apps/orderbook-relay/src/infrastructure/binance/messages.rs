//! Binance Stream Messages
//!
//! Wire types for the public market data streams. Only the fields the relay
//! uses are modelled; everything else in a payload is ignored.
//!
//! # Combined stream envelope
//!
//! ```json
//! {"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":160,"bids":[["0.0024","10"]],"asks":[]}}
//! {"stream":"btcusdt@ticker","data":{"e":"24hrTicker","s":"BTCUSDT","c":"42000.50"}}
//! ```
//!
//! A single (non-combined) depth stream sends the `data` object directly.

use serde::{Deserialize, Serialize};

use crate::domain::orderbook::PriceLevel;

/// Envelope used by `/stream?streams=...` connections.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CombinedEnvelope {
    /// Stream name, e.g. `btcusdt@ticker`.
    pub stream: String,
    /// Stream payload.
    pub data: serde_json::Value,
}

/// Partial book depth payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthPayload {
    /// Sequence number of the book.
    pub last_update_id: u64,
    /// Bid levels, best first.
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first.
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// 24h rolling ticker payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TickerPayload {
    /// Event type (`24hrTicker`).
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Exchange symbol.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Last traded price.
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<String>,
}

/// Which stream a combined message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `<symbol>@depth...`
    Depth,
    /// `<symbol>@ticker`
    Ticker,
    /// Anything else.
    Other,
}

impl StreamKind {
    /// Classify a combined stream name.
    #[must_use]
    pub fn of(stream: &str) -> Self {
        if stream.contains("ticker") {
            Self::Ticker
        } else if stream.contains("depth") {
            Self::Depth
        } else {
            Self::Other
        }
    }
}
