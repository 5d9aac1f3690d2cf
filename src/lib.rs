//! # Fanline
//!
//! `fanline` is a real-time message fan-out server: clients push short
//! text messages over WebSockets and every other connected client hears
//! them with low latency, while a durable pipeline records every message
//! for later retrieval, across restarts and across instances.
//!
//! ## Core Modules
//!
//! Three delivery tiers with different consistency/latency regimes, plus
//! the glue around them:
//!
//! - `registry`: live connection membership and in-process broadcast (fast,
//!   best-effort).
//! - `bus`: cross-instance relay so every instance's registry hears
//!   messages originated anywhere (ephemeral, fire-and-forget).
//! - `journal`: partitioned append-only log with producer and
//!   consumer-group cursor (durable, ordered, at-least-once).
//! - `sink`: batch accumulator and persistent message store (batched,
//!   retried, idempotent on redelivery).
//! - `pipeline`: the explicit handle wiring the tiers together.
//! - `transport`: the client-facing WebSocket boundary.
//! - `config`: settings loading and defaults.
//! - `utils`: error taxonomy and logging setup.

pub mod bus;
pub mod config;
pub mod journal;
pub mod pipeline;
pub mod registry;
pub mod sink;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
