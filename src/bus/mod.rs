//! The `bus` module is the cross-process leg of fan-out: every locally
//! originated message is relayed to the other server instances, and every
//! remotely originated message is handed to the local registry.
//!
//! Delivery here is explicitly best-effort. Publishing returns before any
//! remote delivery is confirmed, a lost relay connection is logged and
//! ridden out with reconnects, and nothing on this path is retried;
//! durability is the journal's job, not the bus's.
//!
//! Payloads are wrapped in an [`Envelope`] tagged with the originating
//! instance so a process that hears its own publish echoed back can filter
//! it out instead of double-delivering to clients it already served.

pub mod client;
pub mod envelope;
pub mod relay;

pub use client::RelayBus;
pub use envelope::Envelope;

#[cfg(test)]
mod tests;
