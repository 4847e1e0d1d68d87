//! Distributed Inverted-Index Builder and Search Service
//!
//! This library crate defines the core modules shared by the two binaries
//! (`coordinator` and `worker`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems:
//!
//! - **`normalizer`**: The text processing pipeline. Turns raw document text
//!   (or a query term) into a deterministic list of stemmed tokens for a
//!   configured language. Shared by both binaries so that query-time and
//!   index-time normalization never diverge.
//! - **`broker`**: The communication substrate. A typed client over a
//!   Redis-compatible store providing per-worker task queues, a fan-in
//!   publish/subscribe results channel, and TTL'd heartbeat keys. Ships a
//!   real Redis implementation and an in-memory one for tests.
//! - **`worker`**: The worker runtime. Drains its own task queue, computes
//!   per-document term frequencies, publishes partial index results, and
//!   reports liveness through expiring heartbeats.
//! - **`coordinator`**: The orchestration layer. Dispatches document tasks to
//!   the least-loaded live worker, merges partial results into the global
//!   inverted index, answers keyword queries, and exposes the HTTP API.

pub mod broker;
pub mod config;
pub mod coordinator;
pub mod normalizer;
pub mod worker;
