//! The `sink` module is the end of the durable pipeline: the batch
//! accumulator that buffers consumed events and the persistent store it
//! flushes them into.
//!
//! Flushing is triggered by size or by time, whichever comes first, and
//! the buffer is swapped rather than drained in place so a flush in
//! progress never loses or duplicates an event that arrives mid-flush.
//! Bulk writes are keyed by each record's uniqueness key, which makes
//! redelivered events collapse into a single row instead of
//! double-counting.

pub mod accumulator;
pub mod store;

pub use accumulator::{BatchAccumulator, DroppedBatch};
pub use store::{MessageStore, PersistedRecord, RecordSink, StoredRecord};
