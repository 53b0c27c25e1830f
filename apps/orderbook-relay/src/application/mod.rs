//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the stream broker and the port interfaces that
//! define how it interacts with upstream feeds and downstream consumers.

/// Port interfaces for upstream transports and downstream sinks.
pub mod ports;

/// Stream broker and fan-out dispatcher.
pub mod services;
