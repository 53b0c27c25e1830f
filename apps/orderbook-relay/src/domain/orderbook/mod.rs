//! Order Book Types
//!
//! Canonical internal representation of the data this relay moves around:
//! the normalized [`Symbol`] key, raw [`PriceLevel`]s, and the outbound
//! [`OrderBookSnapshot`] view.
//!
//! # Snapshot Assembly
//!
//! [`BookAssembler`] turns depth updates into snapshots. It owns the
//! last-price cache for one symbol: ticker events update it, depth events
//! read it. The assembler lives exactly as long as the symbol's upstream
//! connector, so the cached price survives reconnects but not teardown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Number of price levels kept per side when none is configured.
pub const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Last price reported before any ticker event has been seen.
pub const DEFAULT_LAST_PRICE: &str = "0";

// =============================================================================
// Symbol
// =============================================================================

/// Errors produced when parsing a symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// Symbol was empty after trimming.
    #[error("symbol cannot be empty")]
    Empty,

    /// Symbol exceeds the maximum length.
    #[error("symbol '{0}' exceeds {max} characters", max = Symbol::MAX_LEN)]
    TooLong(String),

    /// Symbol contains characters other than ASCII letters and digits.
    #[error("symbol '{0}' contains invalid characters")]
    InvalidCharacters(String),
}

/// A normalized, uppercase trading pair identifier (e.g. `BTCUSDT`).
///
/// The only way to obtain a `Symbol` is through [`Symbol::parse`], which
/// trims and uppercases the input. Every lookup in the broker is keyed on
/// this type, so `btcusdt` and `BTCUSDT` always resolve to the same stream.
///
/// # Example
///
/// ```rust
/// use orderbook_relay::domain::orderbook::Symbol;
///
/// let symbol = Symbol::parse(" btcusdt ").unwrap();
/// assert_eq!(symbol.as_str(), "BTCUSDT");
/// assert_eq!(symbol.stream_key(), "btcusdt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Maximum accepted symbol length.
    pub const MAX_LEN: usize = 20;

    /// Parse and normalize a raw symbol.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] if the symbol is empty, too long, or contains
    /// anything other than ASCII alphanumerics.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(SymbolError::TooLong(trimmed.to_string()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SymbolError::InvalidCharacters(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The normalized (uppercase) form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used in upstream stream names.
    #[must_use]
    pub fn stream_key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Price Levels
// =============================================================================

/// A single `[price, quantity]` level, kept as the exchange's decimal strings.
///
/// Serializes as a two-element JSON array, matching the upstream format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel(pub String, pub String);

impl PriceLevel {
    /// Create a level from price and quantity strings.
    #[must_use]
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self(price.into(), quantity.into())
    }

    /// Price as sent by the exchange.
    #[must_use]
    pub fn price(&self) -> &str {
        &self.0
    }

    /// Quantity as sent by the exchange.
    #[must_use]
    pub fn quantity(&self) -> &str {
        &self.1
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Outbound order book view delivered to subscribers.
///
/// # Wire Format (JSON)
/// ```json
/// {"symbol":"BTCUSDT","lastUpdateId":160,"bids":[["42000.10","0.5"]],"asks":[["42000.20","1.2"]],"lastPrice":"42000.15"}
/// ```
///
/// `lastPrice` is omitted when the relay runs against the depth-only stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    /// Normalized symbol.
    pub symbol: Symbol,
    /// Upstream update identifier, passed through verbatim.
    pub last_update_id: u64,
    /// Best bids, in upstream order.
    pub bids: Vec<PriceLevel>,
    /// Best asks, in upstream order.
    pub asks: Vec<PriceLevel>,
    /// Most recent traded price, when ticker data is tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<String>,
}

// =============================================================================
// Book Assembler
// =============================================================================

/// Builds snapshots for one symbol and caches its last traded price.
#[derive(Debug, Clone)]
pub struct BookAssembler {
    symbol: Symbol,
    depth_levels: usize,
    track_last_price: bool,
    last_price: Option<String>,
}

impl BookAssembler {
    /// Create an assembler.
    ///
    /// `depth_levels` is the number of levels kept per side. When
    /// `track_last_price` is false, snapshots carry no `lastPrice`.
    #[must_use]
    pub const fn new(symbol: Symbol, depth_levels: usize, track_last_price: bool) -> Self {
        Self {
            symbol,
            depth_levels,
            track_last_price,
            last_price: None,
        }
    }

    /// Record the last traded price from a ticker event.
    ///
    /// A ticker without a price resets the cache to [`DEFAULT_LAST_PRICE`].
    pub fn record_last_price(&mut self, price: Option<String>) {
        self.last_price = Some(price.unwrap_or_else(|| DEFAULT_LAST_PRICE.to_string()));
    }

    /// Currently cached last price, if any ticker has been seen.
    #[must_use]
    pub fn last_price(&self) -> Option<&str> {
        self.last_price.as_deref()
    }

    /// Build a snapshot from a depth update.
    ///
    /// Levels are truncated by position; the exchange already sorts them by
    /// price, best first.
    #[must_use]
    pub fn assemble(
        &self,
        last_update_id: u64,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
    ) -> OrderBookSnapshot {
        bids.truncate(self.depth_levels);
        asks.truncate(self.depth_levels);

        let last_price = self.track_last_price.then(|| {
            self.last_price
                .clone()
                .unwrap_or_else(|| DEFAULT_LAST_PRICE.to_string())
        });

        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            last_update_id,
            bids,
            asks,
            last_price,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
