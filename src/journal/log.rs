use std::sync::{Arc, Mutex};

use chrono::Utc;
use sled::Db;

use crate::journal::event::Event;
use crate::utils::error::JournalError;

/// Tree holding one committed offset per (consumer group, partition).
const CURSOR_TREE: &str = "cursors";

/// Partitioned append-only log on an embedded store.
///
/// Each partition is a tree keyed by big-endian offset, so a range scan
/// walks events in offset order. Appends run under `append_lock`, which is
/// what makes offsets strictly increasing and never reused; producers ask
/// for an append, they never pick the offset.
#[derive(Debug, Clone)]
pub struct EventJournal {
    db: Db,
    append_lock: Arc<Mutex<()>>,
}

impl EventJournal {
    pub fn open(path: &str) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    fn partition(&self, topic: &str) -> Result<sled::Tree, JournalError> {
        Ok(self.db.open_tree(format!("log:{topic}"))?)
    }

    fn cursors(&self) -> Result<sled::Tree, JournalError> {
        Ok(self.db.open_tree(CURSOR_TREE)?)
    }

    /// Appends an event to `topic` and returns it with its assigned
    /// offset.
    pub fn append(&self, topic: &str, key: &str, payload: &str) -> Result<Event, JournalError> {
        let tree = self.partition(topic)?;
        let _guard = self.append_lock.lock().unwrap();

        let offset = match tree.last()? {
            Some((last_key, _)) => decode_offset(&last_key) + 1,
            None => 0,
        };
        let event = Event {
            offset,
            key: key.to_string(),
            payload: payload.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        tree.insert(offset.to_be_bytes(), serde_json::to_vec(&event)?)?;
        Ok(event)
    }

    /// Reads up to `max` events from `topic` starting at offset `from`, in
    /// offset order.
    pub fn read_from(&self, topic: &str, from: u64, max: usize) -> Result<Vec<Event>, JournalError> {
        let tree = self.partition(topic)?;
        let mut events = Vec::new();
        for item in tree.range(from.to_be_bytes()..).take(max) {
            let (_, value) = item?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    /// Last committed offset for a consumer group on a partition, or
    /// `None` if the group has never committed there.
    pub fn committed(&self, group: &str, topic: &str) -> Result<Option<u64>, JournalError> {
        Ok(self
            .cursors()?
            .get(cursor_key(group, topic))?
            .map(|value| decode_offset(&value)))
    }

    /// Advances the durable cursor. Called only after the event at
    /// `offset` has been absorbed downstream; a cursor lost to a crash
    /// widens redelivery, never loses events.
    pub fn commit(&self, group: &str, topic: &str, offset: u64) -> Result<(), JournalError> {
        self.cursors()?
            .insert(cursor_key(group, topic), offset.to_be_bytes().to_vec())?;
        Ok(())
    }

    /// Waits until everything appended so far has reached disk.
    pub async fn flush(&self) -> Result<(), JournalError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

fn cursor_key(group: &str, topic: &str) -> String {
    format!("{group}:{topic}")
}

fn decode_offset(bytes: &[u8]) -> u64 {
    bytes.try_into().map(u64::from_be_bytes).unwrap_or(0)
}
