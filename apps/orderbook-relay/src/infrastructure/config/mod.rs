//! Configuration Module
//!
//! Environment-driven configuration for the relay.

mod settings;

pub use settings::{
    ConfigError, DeliverySettings, MAX_DEPTH_LEVELS, ReconnectSettings, RelayConfig,
    ServerSettings, StreamMode, UpstreamSettings,
};
