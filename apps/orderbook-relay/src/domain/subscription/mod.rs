//! Subscription Tracking
//!
//! Domain types for tracking which downstream consumers are attached to a
//! symbol's stream.
//!
//! # Design
//!
//! Each symbol owns one [`SubscriberRegistry`]. The registry is the single
//! source of truth for two decisions:
//! - whether the symbol's upstream stream is still needed (non-empty), and
//! - who receives the next snapshot (the fan-out target list).
//!
//! The registry is generic over the handle type so the domain layer stays
//! free of transport concerns; the broker stores shared sink handles in it.
//! Delivery never iterates the live map: [`SubscriberRegistry::snapshot`]
//! copies the membership so consumers can be added or evicted while a
//! fan-out pass is in flight.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a downstream consumer (one WebSocket client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Subscriber Registry
// =============================================================================

/// Thread-safe set of consumer handles for a single symbol.
///
/// # Example
///
/// ```rust
/// use orderbook_relay::domain::subscription::{ConsumerId, SubscriberRegistry};
///
/// let registry = SubscriberRegistry::new();
/// let alice = ConsumerId::new();
///
/// assert!(registry.add(alice, "alice-sink"));
/// assert!(!registry.is_empty());
///
/// let targets = registry.snapshot();
/// assert_eq!(targets.len(), 1);
///
/// assert!(registry.remove(alice));
/// assert!(registry.is_empty());
/// ```
#[derive(Debug)]
pub struct SubscriberRegistry<H> {
    consumers: RwLock<HashMap<ConsumerId, H>>,
}

impl<H> Default for SubscriberRegistry<H> {
    fn default() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
        }
    }
}

impl<H> SubscriberRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer.
    ///
    /// Returns `false` if the consumer was already registered; the existing
    /// handle is kept.
    pub fn add(&self, consumer: ConsumerId, handle: H) -> bool {
        let mut consumers = self.consumers.write();
        if consumers.contains_key(&consumer) {
            return false;
        }
        consumers.insert(consumer, handle);
        true
    }

    /// Remove a consumer. Returns `false` if it was not registered.
    pub fn remove(&self, consumer: ConsumerId) -> bool {
        self.consumers.write().remove(&consumer).is_some()
    }

    /// Remove several consumers under one lock. Returns how many were present.
    pub fn remove_all(&self, consumers: &[ConsumerId]) -> usize {
        if consumers.is_empty() {
            return 0;
        }
        let mut map = self.consumers.write();
        consumers
            .iter()
            .filter(|id| map.remove(id).is_some())
            .count()
    }

    /// Whether the consumer is registered.
    #[must_use]
    pub fn contains(&self, consumer: ConsumerId) -> bool {
        self.consumers.read().contains_key(&consumer)
    }

    /// Whether no consumers remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.read().is_empty()
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.read().len()
    }

    /// Drop every consumer and return how many there were.
    pub fn clear(&self) -> usize {
        let mut consumers = self.consumers.write();
        let count = consumers.len();
        consumers.clear();
        count
    }
}

impl<H: Clone> SubscriberRegistry<H> {
    /// Copy the current membership for a delivery pass.
    ///
    /// Mutations after this call do not affect the returned list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ConsumerId, H)> {
        self.consumers
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Subscription statistics across all symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    /// Number of symbols with a registry.
    pub symbol_count: usize,
    /// Number of subscriptions across all symbols.
    pub subscriber_count: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn add_new_consumer() {
        let registry = SubscriberRegistry::new();
        let id = ConsumerId::new();

        assert!(registry.add(id, 1));
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_duplicate_consumer_keeps_original() {
        let registry = SubscriberRegistry::new();
        let id = ConsumerId::new();

        registry.add(id, "first");
        assert!(!registry.add(id, "second"));

        assert_eq!(registry.snapshot(), vec![(id, "first")]);
    }

    #[test]
    fn remove_last_consumer_empties_registry() {
        let registry = SubscriberRegistry::new();
        let id = ConsumerId::new();

        registry.add(id, ());
        assert!(registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_unknown_consumer_is_noop() {
        let registry = SubscriberRegistry::new();
        registry.add(ConsumerId::new(), ());

        assert!(!registry.remove(ConsumerId::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_all_counts_only_present() {
        let registry = SubscriberRegistry::new();
        let a = ConsumerId::new();
        let b = ConsumerId::new();
        let c = ConsumerId::new();
        registry.add(a, ());
        registry.add(b, ());

        let removed = registry.remove_all(&[a, c]);

        assert_eq!(removed, 1);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
    }

    #[test]
    fn snapshot_is_stable_against_later_mutation() {
        let registry = SubscriberRegistry::new();
        let a = ConsumerId::new();
        let b = ConsumerId::new();
        registry.add(a, "a");
        registry.add(b, "b");

        let targets = registry.snapshot();
        registry.remove(a);
        registry.add(ConsumerId::new(), "c");

        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&(a, "a")));
        assert!(targets.contains(&(b, "b")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_returns_previous_size() {
        let registry = SubscriberRegistry::new();
        registry.add(ConsumerId::new(), ());
        registry.add(ConsumerId::new(), ());

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn consumer_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| ConsumerId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn thread_safety_concurrent_adds() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut handles = vec![];

        for i in 0..10 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                r.add(ConsumerId::new(), i);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn thread_safety_concurrent_removes() {
        let registry = Arc::new(SubscriberRegistry::new());
        let ids: Vec<_> = (0..10).map(|_| ConsumerId::new()).collect();
        for id in &ids {
            registry.add(*id, ());
        }

        let mut handles = vec![];
        for id in ids {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                r.remove(id);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }
}
