//! The `journal` module is the durable leg of the pipeline: a partitioned
//! append-only log, the producer that appends every inbound message to it,
//! and the consumer that pulls events back off in strict offset order and
//! feeds the batch accumulator.
//!
//! Offsets are assigned by the log on append, strictly increasing within a
//! partition and never reused; an event is immutable once appended. A
//! consumer group's progress is a durable cursor, advanced only after an
//! event has been absorbed downstream, so a crash redelivers rather than
//! loses: at-least-once, never silent drop.

pub mod consumer;
pub mod event;
pub mod log;
pub mod producer;

pub use consumer::{ConsumerState, DurableConsumer};
pub use event::Event;
pub use log::EventJournal;
pub use producer::DurableProducer;
