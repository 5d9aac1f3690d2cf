//! The `registry` module tracks live client connections and performs the
//! in-process leg of message fan-out.
//!
//! The registry owns the membership set exclusively: connections are
//! created on accept, destroyed on disconnect, and never delivered to
//! after they are unregistered. Broadcasts never block on a slow
//! receiver: each connection has a bounded outgoing buffer and overflow
//! drops the message for that connection only.

pub mod connection;
pub mod engine;

pub use connection::{Connection, ConnectionId};
pub use engine::ConnectionRegistry;

#[cfg(test)]
mod tests;
