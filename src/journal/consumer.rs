use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerSettings;
use crate::journal::log::EventJournal;
use crate::sink::{BatchAccumulator, PersistedRecord};

/// Per-partition consumer states. `Paused` is entered when the
/// accumulator pushes back; `Stopped` only on explicit shutdown. A
/// poison event that never ingests pauses and redelivers forever rather
/// than being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Consuming,
    Paused,
    Stopped,
}

/// Pulls events off the journal in strict offset order under a named
/// consumer group and hands them to the batch accumulator.
///
/// The cursor is advanced only after an event has been absorbed into the
/// accumulator's buffer, not after it is flushed, which bounds redelivery
/// after a crash to the events still sitting in an unflushed buffer.
pub struct DurableConsumer {
    journal: EventJournal,
    accumulator: BatchAccumulator,
    group: String,
    topic: String,
    batch_size: usize,
    poll_interval: Duration,
    pause_backoff: Duration,
    state: ConsumerState,
}

impl DurableConsumer {
    pub fn new(
        journal: EventJournal,
        accumulator: BatchAccumulator,
        settings: &ConsumerSettings,
        topic: &str,
    ) -> Self {
        Self {
            journal,
            accumulator,
            group: settings.group.clone(),
            topic: topic.to_string(),
            batch_size: settings.batch_size,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            pause_backoff: Duration::from_millis(settings.pause_backoff_ms),
            state: ConsumerState::Idle,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Runs until `shutdown` flips, then completes any in-flight flush
    /// before returning so an absorbed-but-unflushed batch is not lost to
    /// an orderly shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let next = match self.journal.committed(&self.group, &self.topic) {
                Ok(Some(offset)) => offset + 1,
                Ok(None) => 0,
                Err(e) => {
                    error!("cursor read failed for {}/{}: {e}", self.group, self.topic);
                    self.wait(self.poll_interval, &mut shutdown).await;
                    continue;
                }
            };

            let events = match self.journal.read_from(&self.topic, next, self.batch_size) {
                Ok(events) => events,
                Err(e) => {
                    error!("journal read failed for {}: {e}", self.topic);
                    self.wait(self.poll_interval, &mut shutdown).await;
                    continue;
                }
            };

            if events.is_empty() {
                self.transition(ConsumerState::Idle);
                self.wait(self.poll_interval, &mut shutdown).await;
                continue;
            }

            self.transition(ConsumerState::Consuming);
            'events: for event in events {
                loop {
                    if *shutdown.borrow() {
                        break 'events;
                    }
                    match self.accumulator.ingest(PersistedRecord::from_event(&event)).await {
                        Ok(()) => {
                            if let Err(e) =
                                self.journal.commit(&self.group, &self.topic, event.offset)
                            {
                                // An uncommitted cursor only widens
                                // redelivery; keep consuming.
                                error!("cursor commit failed at offset {}: {e}", event.offset);
                            }
                            break;
                        }
                        Err(e) => {
                            self.transition(ConsumerState::Paused);
                            warn!(
                                "partition {} paused at offset {}: {e}",
                                self.topic, event.offset
                            );
                            self.wait(self.pause_backoff, &mut shutdown).await;
                            self.transition(ConsumerState::Consuming);
                            // Loop around and redeliver the same event.
                        }
                    }
                }
            }
        }

        self.transition(ConsumerState::Stopped);
        info!("consumer {}/{} stopped", self.group, self.topic);
        let _ = self.accumulator.flush().await;
    }

    fn transition(&mut self, next: ConsumerState) {
        if self.state != next {
            debug!(
                "consumer {}/{}: {:?} -> {next:?}",
                self.group, self.topic, self.state
            );
            self.state = next;
        }
    }

    async fn wait(&self, duration: Duration, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.changed() => {}
        }
    }
}
