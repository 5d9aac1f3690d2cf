//! The `error` module defines the error types used across the pipeline.
//!
//! Each delivery tier has its own failure domain and the types here keep
//! those domains separate: a connection-local transport failure never
//! crosses into the durable path, a bus failure is swallowed at the bus
//! boundary, and persistent-store failures surface through the batch
//! accumulator's retry policy.

use thiserror::Error;

/// Failure to stand up the client-facing WebSocket listener or the relay
/// endpoint. Per-connection I/O failures are handled inline by the
/// connection tasks and never become process-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to reach or speak to the relay endpoint. The bus logs and
/// swallows these; fan-out degrades to single-instance scope until the
/// relay recovers.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("relay connection error: {0}")]
    Connection(#[from] tungstenite::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publish queue full")]
    QueueFull,
}

/// Storage-level failure in the append-only journal, shared by the append,
/// read, and cursor paths.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("event codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failure surfaced to the ingress path when an append cannot be
/// acknowledged.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("durable ack timed out after {waited_ms}ms")]
    AckTimeout { waited_ms: u64 },
}

/// Retryable ingest failure: the accumulator buffer is at capacity. The
/// consumer treats this as backpressure, pauses the partition, and
/// redelivers the same event after a backoff.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("accumulator buffer at capacity ({limit} records)")]
    BufferFull { limit: usize },
}

/// Persistent-store failure during a bulk write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A flush that failed every allowed attempt. The batch it carried has
/// been dropped and reported on the accumulator's fatal-error channel.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("bulk write failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}
