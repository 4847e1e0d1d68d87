//! Broker Substrate
//!
//! Everything that crosses a process boundary goes through here: per-worker
//! task queues (Redis lists), the fan-in partial-results channel (pub/sub),
//! and worker heartbeats (string keys with TTL).
//!
//! ## Submodules
//! - **`protocol`**: Wire types and the exact key/channel names. Changing a
//!   name here breaks cross-version compatibility.
//! - **`client`**: The `Broker` capability trait plus `BrokerClient`, the
//!   typed wrapper that owns all (de)serialization of broker payloads.
//! - **`redis`**: The production implementation backed by a Redis-compatible
//!   store.
//! - **`memory`**: A single-process implementation with the same semantics,
//!   used by the test suite.

pub mod client;
pub mod memory;
pub mod protocol;
pub mod redis;

pub use client::{Broker, BrokerClient};
pub use memory::MemoryBroker;
pub use redis::RedisBroker;
