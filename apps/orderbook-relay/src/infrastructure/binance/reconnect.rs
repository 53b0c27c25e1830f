//! Reconnect Policy
//!
//! Delay schedule for upstream connect retries. The default is a fixed 5
//! second wait with unlimited attempts; a multiplier above 1.0 turns it into
//! capped exponential backoff, and a jitter factor spreads retries out.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::ReconnectSettings;

/// Default wait between connect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Retry schedule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the wait.
    pub max_delay: Duration,
    /// Growth factor per failed attempt (1.0 keeps the delay fixed).
    pub multiplier: f64,
    /// Random spread as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = never give up).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Constant delay, no jitter, unlimited attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Build from environment-derived settings.
    #[must_use]
    pub const fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: settings.initial_delay,
            max_delay: settings.max_delay,
            multiplier: settings.multiplier,
            jitter_factor: settings.jitter,
            max_attempts: settings.max_attempts,
        }
    }
}

/// Stateful retry schedule for one connector.
///
/// # Example
///
/// ```rust
/// use orderbook_relay::infrastructure::binance::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
///
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    base_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Start a fresh schedule.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let base_delay = config.initial_delay;
        Self {
            config,
            base_delay,
            attempts: 0,
        }
    }

    /// Wait before the next attempt, or `None` once attempts are exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.base_delay);
        self.base_delay = self.grown(self.base_delay);
        Some(delay)
    }

    /// Return to the initial delay after a successful connect.
    pub const fn reset(&mut self) {
        self.base_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Failed attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    fn grown(&self, delay: Duration) -> Duration {
        let max = self.config.max_delay;
        if delay >= max {
            return max;
        }
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.config.multiplier)
            .map_or(max, |next| next.min(max))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = rand::rng().random_range(-factor..=factor);
        Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + spread))
            .unwrap_or(delay)
            .max(Duration::from_millis(1))
    }
}
