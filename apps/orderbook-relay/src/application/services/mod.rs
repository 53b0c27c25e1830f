//! Application Services
//!
//! - [`StreamBroker`]: owns per-symbol streams, starts connectors lazily and
//!   stops them when the last subscriber leaves
//! - [`FanOutDispatcher`]: delivers one snapshot to every subscriber of a
//!   symbol, evicting consumers whose delivery fails

mod broker;
mod dispatcher;

pub use broker::{StreamBroker, StreamState, StreamStatus};
pub use dispatcher::{FanOutDispatcher, FanOutReport, SinkRegistry};
