use std::cmp::Reverse;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use uuid::Uuid;

use crate::journal::Event;
use crate::utils::error::StoreError;

const MESSAGE_TREE: &str = "messages";

/// A row bound for the persistent store: the message text and the
/// uniqueness key that makes redelivered events collapse into one row.
/// Records without a key are always inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedRecord {
    pub text: String,
    pub key: Option<String>,
}

impl PersistedRecord {
    pub fn from_event(event: &Event) -> Self {
        Self {
            text: event.payload.clone(),
            key: Some(event.key.clone()),
        }
    }
}

/// A row as stored, with its insertion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub text: String,
    /// Unix milliseconds at insertion.
    pub stored_at: i64,
}

/// Where the accumulator's batches land. The one seam the accumulator
/// needs: a transactional bulk insert that skips rows whose uniqueness key
/// is already present instead of failing the whole batch.
pub trait RecordSink: Send + Sync {
    /// Writes a batch atomically, returning how many rows were actually
    /// inserted (duplicates are skipped, not errors).
    fn insert_batch(&self, batch: &[PersistedRecord]) -> Result<usize, StoreError>;
}

/// The persistent message store: a single table of message rows in an
/// embedded database, keyed by uniqueness key.
#[derive(Debug, Clone)]
pub struct MessageStore {
    db: sled::Db,
}

impl MessageStore {
    pub fn open(path: &str) -> Result<Self, sled::Error> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    fn messages(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(MESSAGE_TREE)?)
    }

    /// Most recently persisted records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError> {
        let tree = self.messages()?;
        let mut records = Vec::new();
        for item in tree.iter() {
            let (_, value) = item?;
            records.push(serde_json::from_slice::<StoredRecord>(&value)?);
        }
        records.sort_by_key(|record| Reverse(record.stored_at));
        records.truncate(limit);
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.messages()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl RecordSink for MessageStore {
    fn insert_batch(&self, batch: &[PersistedRecord]) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let tree = self.messages()?;
        let stored_at = Utc::now().timestamp_millis();

        let result = tree.transaction(|tx| {
            let mut inserted = 0;
            for record in batch {
                let key = match &record.key {
                    Some(key) => key.clone(),
                    None => format!("row-{}", Uuid::new_v4()),
                };
                if tx.get(key.as_bytes())?.is_some() {
                    continue; // uniqueness key already present
                }
                let row = StoredRecord {
                    text: record.text.clone(),
                    stored_at,
                };
                let value = serde_json::to_vec(&row)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::Codec(e)))?;
                tx.insert(key.as_bytes(), value)?;
                inserted += 1;
            }
            Ok(inserted)
        });

        result.map_err(|e| match e {
            TransactionError::Abort(store_error) => store_error,
            TransactionError::Storage(sled_error) => StoreError::Storage(sled_error),
        })
    }
}
