//! Domain Layer - Core order book types and subscription bookkeeping.
//!
//! This layer contains the core domain types for relaying order book
//! snapshots. Nothing here touches the network; all types are plain Rust
//! with serialization support.

/// Symbols, price levels, and order book snapshot assembly.
pub mod orderbook;

/// Per-symbol subscriber tracking.
pub mod subscription;
