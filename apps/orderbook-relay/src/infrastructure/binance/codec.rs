//! Stream Codec
//!
//! Turns raw text frames from Binance into [`FeedEvent`]s. Both the combined
//! envelope and bare depth payloads are accepted, so the same codec serves
//! either stream mode.

use serde_json::Value;

use crate::infrastructure::binance::messages::{
    CombinedEnvelope, DepthPayload, StreamKind, TickerPayload,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not valid JSON, or a payload with the wrong shape.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON that is not a recognizable stream message.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded upstream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Partial book depth update.
    Depth(DepthPayload),
    /// Ticker update.
    Ticker(TickerPayload),
    /// A message from a stream the relay does not use.
    Ignored(String),
}

/// JSON codec for Binance market streams.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON or does not match a known
    /// payload shape.
    pub fn decode(&self, text: &str) -> Result<FeedEvent, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(ref object) = value else {
            return Err(CodecError::InvalidFormat(format!(
                "expected object, got {}",
                json_kind(&value)
            )));
        };

        if object.contains_key("stream") {
            let envelope: CombinedEnvelope = serde_json::from_value(value)?;
            return Self::decode_combined(envelope);
        }

        if object.contains_key("lastUpdateId") {
            return Ok(FeedEvent::Depth(serde_json::from_value(value)?));
        }

        if object.get("e").and_then(Value::as_str) == Some("24hrTicker") {
            return Ok(FeedEvent::Ticker(serde_json::from_value(value)?));
        }

        Err(CodecError::InvalidFormat("unrecognized payload".to_string()))
    }

    fn decode_combined(envelope: CombinedEnvelope) -> Result<FeedEvent, CodecError> {
        match StreamKind::of(&envelope.stream) {
            StreamKind::Ticker => Ok(FeedEvent::Ticker(serde_json::from_value(envelope.data)?)),
            StreamKind::Depth => Ok(FeedEvent::Depth(serde_json::from_value(envelope.data)?)),
            StreamKind::Other => Ok(FeedEvent::Ignored(envelope.stream)),
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
