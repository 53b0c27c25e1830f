//! Relay Configuration Settings
//!
//! Configuration types for the order book relay, loaded from environment
//! variables. Values that fail to parse fall back to their defaults; values
//! that parse but make no sense are rejected.

use std::time::Duration;

use crate::domain::orderbook::{DEFAULT_DEPTH_LEVELS, Symbol};

/// Deepest partial book Binance publishes.
pub const MAX_DEPTH_LEVELS: usize = 20;

/// Upstream stream layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Depth and ticker over one combined connection; snapshots carry
    /// `lastPrice`.
    #[default]
    Combined,
    /// Depth stream only; snapshots omit `lastPrice`.
    Depth,
}

impl StreamMode {
    /// Parse a mode name, ignoring case.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "combined" => Some(Self::Combined),
            "depth" => Some(Self::Depth),
            _ => None,
        }
    }

    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Depth => "depth",
        }
    }

    /// Whether snapshots in this mode carry a last traded price.
    #[must_use]
    pub const fn tracks_last_price(&self) -> bool {
        matches!(self, Self::Combined)
    }
}

/// Gateway and health server bind settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Gateway bind host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Health check and metrics port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            health_port: 8082,
        }
    }
}

impl ServerSettings {
    /// `host:port` for the gateway listener.
    #[must_use]
    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream exchange settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Stream host including port.
    pub host: String,
    /// Stream layout.
    pub mode: StreamMode,
    /// Levels kept per side in outbound snapshots.
    pub depth_levels: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            host: "stream.binance.com:9443".to_string(),
            mode: StreamMode::default(),
            depth_levels: DEFAULT_DEPTH_LEVELS,
        }
    }
}

impl UpstreamSettings {
    /// WebSocket URL for `symbol` in the configured mode.
    ///
    /// ```rust
    /// use orderbook_relay::domain::orderbook::Symbol;
    /// use orderbook_relay::infrastructure::config::UpstreamSettings;
    ///
    /// let url = UpstreamSettings::default().stream_url(&Symbol::parse("BTCUSDT").unwrap());
    /// assert_eq!(
    ///     url,
    ///     "wss://stream.binance.com:9443/stream?streams=btcusdt@depth20@100ms/btcusdt@ticker"
    /// );
    /// ```
    #[must_use]
    pub fn stream_url(&self, symbol: &Symbol) -> String {
        let key = symbol.stream_key();
        match self.mode {
            StreamMode::Combined => format!(
                "wss://{}/stream?streams={key}@depth{MAX_DEPTH_LEVELS}@100ms/{key}@ticker",
                self.host
            ),
            StreamMode::Depth => format!(
                "wss://{}/ws/{key}@depth{MAX_DEPTH_LEVELS}@100ms",
                self.host
            ),
        }
    }
}

/// Upstream reconnect settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Delay after the first failed connect.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Backoff multiplier (1.0 = fixed delay).
    pub multiplier: f64,
    /// Jitter fraction.
    pub jitter: f64,
    /// Attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: 0,
        }
    }
}

/// Per-consumer delivery settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Capacity of each consumer's outbound channel.
    pub buffer: usize,
    /// How long a delivery may wait for channel space.
    pub send_timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            buffer: 64,
            send_timeout: Duration::from_secs(2),
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Listener settings.
    pub server: ServerSettings,
    /// Upstream exchange settings.
    pub upstream: UpstreamSettings,
    /// Reconnect schedule.
    pub reconnect: ReconnectSettings,
    /// Consumer delivery settings.
    pub delivery: DeliverySettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value outside its valid range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value outside its valid range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        let server = ServerSettings {
            host: env
                .string("RELAY_HOST")
                .unwrap_or(defaults.server.host),
            port: env.parse("RELAY_PORT", defaults.server.port),
            health_port: env.parse("RELAY_HEALTH_PORT", defaults.server.health_port),
        };

        let mode = match env.string("BINANCE_STREAM_MODE") {
            Some(raw) => StreamMode::from_str_case_insensitive(&raw).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "BINANCE_STREAM_MODE".to_string(),
                    reason: format!("unknown mode {raw:?}, expected combined or depth"),
                }
            })?,
            None => defaults.upstream.mode,
        };

        let upstream = UpstreamSettings {
            host: env
                .string("BINANCE_STREAM_HOST")
                .unwrap_or(defaults.upstream.host),
            mode,
            depth_levels: env.parse("RELAY_DEPTH_LEVELS", defaults.upstream.depth_levels),
        };

        let initial_delay =
            env.millis("RELAY_RECONNECT_DELAY_MS", defaults.reconnect.initial_delay);
        // Without an explicit cap the delay stays fixed at the configured value.
        let reconnect = ReconnectSettings {
            initial_delay,
            max_delay: env.millis("RELAY_RECONNECT_DELAY_MAX_MS", initial_delay),
            multiplier: env.parse("RELAY_RECONNECT_MULTIPLIER", defaults.reconnect.multiplier),
            jitter: env.parse("RELAY_RECONNECT_JITTER", defaults.reconnect.jitter),
            max_attempts: env.parse(
                "RELAY_RECONNECT_MAX_ATTEMPTS",
                defaults.reconnect.max_attempts,
            ),
        };

        let delivery = DeliverySettings {
            buffer: env.parse("RELAY_SUBSCRIBER_BUFFER", defaults.delivery.buffer),
            send_timeout: env.millis("RELAY_SEND_TIMEOUT_MS", defaults.delivery.send_timeout),
        };

        let config = Self {
            server,
            upstream,
            reconnect,
            delivery,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DEPTH_LEVELS).contains(&self.upstream.depth_levels) {
            return Err(ConfigError::invalid(
                "RELAY_DEPTH_LEVELS",
                format!("must be between 1 and {MAX_DEPTH_LEVELS}"),
            ));
        }
        if self.upstream.host.trim().is_empty() {
            return Err(ConfigError::EmptyValue("BINANCE_STREAM_HOST".to_string()));
        }
        if !self.reconnect.multiplier.is_finite() || self.reconnect.multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "RELAY_RECONNECT_MULTIPLIER",
                "must be a positive number",
            ));
        }
        if !(0.0..1.0).contains(&self.reconnect.jitter) {
            return Err(ConfigError::invalid(
                "RELAY_RECONNECT_JITTER",
                "must be in [0, 1)",
            ));
        }
        if self.reconnect.max_delay < self.reconnect.initial_delay {
            return Err(ConfigError::invalid(
                "RELAY_RECONNECT_DELAY_MAX_MS",
                "must not be below RELAY_RECONNECT_DELAY_MS",
            ));
        }
        if self.delivery.buffer == 0 {
            return Err(ConfigError::invalid(
                "RELAY_SUBSCRIBER_BUFFER",
                "must be at least 1",
            ));
        }
        if self.delivery.send_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "RELAY_SEND_TIMEOUT_MS",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable holds an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();

        assert_eq!(config.server.gateway_addr(), "0.0.0.0:8000");
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.upstream.host, "stream.binance.com:9443");
        assert_eq!(config.upstream.mode, StreamMode::Combined);
        assert_eq!(config.upstream.depth_levels, 10);
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(5));
        assert_eq!(config.delivery.buffer, 64);
        assert_eq!(config.delivery.send_timeout, Duration::from_secs(2));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("RELAY_HOST", "127.0.0.1"),
            ("RELAY_PORT", "9000"),
            ("BINANCE_STREAM_MODE", "DEPTH"),
            ("RELAY_DEPTH_LEVELS", "5"),
            ("RELAY_RECONNECT_DELAY_MS", "250"),
            ("RELAY_RECONNECT_DELAY_MAX_MS", "1000"),
            ("RELAY_RECONNECT_MULTIPLIER", "2.0"),
        ])
        .unwrap();

        assert_eq!(config.server.gateway_addr(), "127.0.0.1:9000");
        assert_eq!(config.upstream.mode, StreamMode::Depth);
        assert_eq!(config.upstream.depth_levels, 5);
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_millis(1000));
    }

    #[test]
    fn unparseable_values_fall_back() {
        let config = load(&[("RELAY_PORT", "not-a-port"), ("RELAY_DEPTH_LEVELS", "ten")]).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upstream.depth_levels, 10);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = load(&[("BINANCE_STREAM_MODE", "spot")]).unwrap_err();
        assert!(err.to_string().contains("BINANCE_STREAM_MODE"));
    }

    #[test]
    fn depth_levels_out_of_range_is_rejected() {
        assert!(load(&[("RELAY_DEPTH_LEVELS", "0")]).is_err());
        assert!(load(&[("RELAY_DEPTH_LEVELS", "21")]).is_err());
        assert!(load(&[("RELAY_DEPTH_LEVELS", "20")]).is_ok());
    }

    #[test]
    fn zero_buffer_is_rejected() {
        assert!(load(&[("RELAY_SUBSCRIBER_BUFFER", "0")]).is_err());
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        assert!(load(&[("RELAY_RECONNECT_MULTIPLIER", "0")]).is_err());
        assert!(load(&[("RELAY_RECONNECT_MULTIPLIER", "-1.5")]).is_err());
    }

    #[test]
    fn raising_reconnect_delay_alone_keeps_it_fixed() {
        let config = load(&[("RELAY_RECONNECT_DELAY_MS", "10000")]).unwrap();

        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(10));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn explicit_max_delay_below_initial_is_rejected() {
        let err = load(&[
            ("RELAY_RECONNECT_DELAY_MS", "10000"),
            ("RELAY_RECONNECT_DELAY_MAX_MS", "6000"),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "RELAY_RECONNECT_DELAY_MAX_MS"
        ));
    }

    #[test]
    fn stream_urls_per_mode() {
        let symbol = Symbol::parse("EthBtc").unwrap();
        let combined = UpstreamSettings::default();
        let depth = UpstreamSettings {
            mode: StreamMode::Depth,
            ..UpstreamSettings::default()
        };

        assert_eq!(
            combined.stream_url(&symbol),
            "wss://stream.binance.com:9443/stream?streams=ethbtc@depth20@100ms/ethbtc@ticker"
        );
        assert_eq!(
            depth.stream_url(&symbol),
            "wss://stream.binance.com:9443/ws/ethbtc@depth20@100ms"
        );
    }

    #[test]
    fn stream_mode_parsing() {
        assert_eq!(StreamMode::from_str_case_insensitive("Combined"), Some(StreamMode::Combined));
        assert_eq!(StreamMode::from_str_case_insensitive(" depth "), Some(StreamMode::Depth));
        assert_eq!(StreamMode::from_str_case_insensitive("trades"), None);
        assert!(StreamMode::Combined.tracks_last_price());
        assert!(!StreamMode::Depth.tracks_last_price());
    }
}
