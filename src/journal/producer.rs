use std::time::Duration;

use tokio::time::timeout;

use crate::config::{AckMode, JournalSettings};
use crate::journal::log::EventJournal;
use crate::utils::error::AppendError;

/// Appends events on behalf of the ingress path.
///
/// `append` blocks its caller until the journal acknowledges at the
/// configured level: `AckMode::Write` returns once the event is accepted
/// into the journal's write buffer, `AckMode::Flush` additionally waits
/// for it to reach disk, bounded by the ack timeout. Stronger acks trade
/// latency for durability.
#[derive(Debug, Clone)]
pub struct DurableProducer {
    journal: EventJournal,
    ack: AckMode,
    ack_timeout: Duration,
}

impl DurableProducer {
    pub fn new(journal: EventJournal, settings: &JournalSettings) -> Self {
        Self {
            journal,
            ack: settings.ack,
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
        }
    }

    /// Appends one event and returns its assigned offset.
    pub async fn append(&self, topic: &str, key: &str, payload: &str) -> Result<u64, AppendError> {
        let event = self
            .journal
            .append(topic, key, payload)
            .map_err(AppendError::Journal)?;

        if self.ack == AckMode::Flush {
            match timeout(self.ack_timeout, self.journal.flush()).await {
                Ok(flushed) => flushed.map_err(AppendError::Journal)?,
                Err(_) => {
                    return Err(AppendError::AckTimeout {
                        waited_ms: self.ack_timeout.as_millis() as u64,
                    });
                }
            }
        }

        Ok(event.offset)
    }
}
