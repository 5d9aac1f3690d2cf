use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::config::BatchSettings;
use crate::sink::store::{PersistedRecord, RecordSink};
use crate::utils::error::{FlushError, IngestError};

/// Report of a batch dropped after exhausting flush retries, delivered on
/// the accumulator's fatal-error channel.
#[derive(Debug, Clone)]
pub struct DroppedBatch {
    pub records: usize,
    pub attempts: u32,
    pub reason: String,
}

/// Buffers consumed events and flushes them into the persistent store on
/// a size-or-time trigger.
///
/// The buffer is swapped, never drained in place: `flush` installs a
/// fresh buffer under the lock and writes the old one outside it, so
/// ingests that arrive mid-flush land in the new buffer and are neither
/// lost nor duplicated. A bulk write that keeps failing is retried with
/// backoff a bounded number of times; after the last attempt the batch is
/// dropped and reported, escalated rather than silently discarded.
#[derive(Clone)]
pub struct BatchAccumulator {
    buffer: Arc<Mutex<Vec<PersistedRecord>>>,
    sink: Arc<dyn RecordSink>,
    settings: BatchSettings,
    fatal: mpsc::UnboundedSender<DroppedBatch>,
}

impl std::fmt::Debug for BatchAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAccumulator")
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl BatchAccumulator {
    /// Returns the accumulator plus the receiving end of its fatal-error
    /// channel. Whoever wires the pipeline drains that channel; a message
    /// there means a batch is gone for good.
    pub fn new(
        sink: Arc<dyn RecordSink>,
        settings: BatchSettings,
    ) -> (Self, mpsc::UnboundedReceiver<DroppedBatch>) {
        let (fatal, fatal_rx) = mpsc::unbounded_channel();
        (
            Self {
                buffer: Arc::default(),
                sink,
                settings,
                fatal,
            },
            fatal_rx,
        )
    }

    /// Absorbs one record into the buffer.
    ///
    /// `Ok` means the record is owned by the accumulator: it will be in
    /// some future flush, or reported on the fatal channel with its
    /// batch. The only failure is a buffer at capacity, the backpressure
    /// signal callers respond to by pausing and retrying later. A flush
    /// triggered by the size threshold runs before this returns, but its
    /// outcome never fails the ingest: the record was absorbed either way.
    pub async fn ingest(&self, record: PersistedRecord) -> Result<(), IngestError> {
        let buffered = {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.len() >= self.settings.max_buffered {
                return Err(IngestError::BufferFull {
                    limit: self.settings.max_buffered,
                });
            }
            buffer.push(record);
            buffer.len()
        };

        if buffered >= self.settings.flush_threshold {
            let _ = self.flush().await;
        }

        Ok(())
    }

    /// Records currently buffered and not yet handed to a flush.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// Swaps the buffer out and bulk-writes it, retrying on failure with a
    /// fixed backoff. An empty buffer produces no write. Returns how many
    /// rows the store actually inserted (redelivered duplicates are
    /// skipped by the sink and not counted).
    pub async fn flush(&self) -> Result<usize, FlushError> {
        let batch = std::mem::take(&mut *self.buffer.lock().unwrap());
        if batch.is_empty() {
            return Ok(0);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.sink.insert_batch(&batch) {
                Ok(inserted) => {
                    debug!("flushed {} records ({inserted} new)", batch.len());
                    return Ok(inserted);
                }
                Err(e) if attempts <= self.settings.max_retries => {
                    warn!("bulk write attempt {attempts} failed: {e}");
                    tokio::time::sleep(Duration::from_millis(self.settings.retry_backoff_ms)).await;
                }
                Err(e) => {
                    let _ = self.fatal.send(DroppedBatch {
                        records: batch.len(),
                        attempts,
                        reason: e.to_string(),
                    });
                    return Err(FlushError::RetriesExhausted {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    /// Interval-driven flush so low-traffic periods still get persisted
    /// promptly. Designed to run as a background task; exits when
    /// `shutdown` flips.
    pub async fn start_flush_timer(accumulator: BatchAccumulator, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(accumulator.settings.flush_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are reported on the fatal channel by flush.
                    let _ = accumulator.flush().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
