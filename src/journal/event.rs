use serde::{Deserialize, Serialize};

/// The durable representation of a message once appended to the log.
///
/// Immutable after append. The offset is assigned by the journal, never by
/// the producer; the key is the producer's correlation key and doubles as
/// the uniqueness key when the event is persisted downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub offset: u64,
    pub key: String,
    pub payload: String,
    /// Ingress time in Unix milliseconds.
    pub timestamp: i64,
}
