//! Outbox storage.
//!
//! A store hands out [`OutboxSession`]s. A session reads committed state
//! directly but stages every write until [`OutboxSession::commit`], which
//! applies them all-or-nothing. Dropping a session without committing
//! discards its staged writes, so a session is safe to abandon on any error
//! path.
//!
//! Sessions take the backend lock only inside individual calls, never across
//! them: the dispatcher can run a whole pipeline between `eligible` and
//! `commit` while publishers keep inserting.

mod error;
mod in_memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::StoreError;
pub use in_memory::{InMemoryOutboxStore, InMemorySession};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteOutboxStore, SqliteSession};

use uuid::Uuid;

use crate::outbox::{OutboxRecord, OutboxStatus};

/// A unit of work against an outbox store.
pub trait OutboxSession {
    /// Stage a new record.
    fn insert(&mut self, record: OutboxRecord) -> Result<(), StoreError>;

    /// Committed records eligible for dispatch, oldest `created_at` first,
    /// at most `limit` of them.
    fn eligible(&mut self, retry_ceiling: u32, limit: usize)
        -> Result<Vec<OutboxRecord>, StoreError>;

    /// Stage replacement of existing records, matched by id.
    fn update(&mut self, records: &[OutboxRecord]) -> Result<(), StoreError>;

    /// Apply all staged writes atomically.
    fn commit(self) -> Result<(), StoreError>;
}

/// Durable storage for outbox records.
pub trait OutboxStore: Send + Sync {
    type Session: OutboxSession;

    /// Open a fresh session.
    fn begin(&self) -> Result<Self::Session, StoreError>;

    /// Fetch one committed record.
    fn find(&self, id: Uuid) -> Result<Option<OutboxRecord>, StoreError>;

    /// All committed records in insertion order, optionally filtered by status.
    fn list(&self, status: Option<OutboxStatus>) -> Result<Vec<OutboxRecord>, StoreError>;
}

/// Convenience queries over any [`OutboxStore`].
pub trait OutboxStoreExt: OutboxStore {
    fn record(&self, id: Uuid) -> Result<Option<OutboxRecord>, StoreError> {
        self.find(id)
    }

    fn records(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        self.list(None)
    }

    fn records_by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxRecord>, StoreError> {
        self.list(Some(status))
    }

    fn count_by_status(&self, status: OutboxStatus) -> Result<usize, StoreError> {
        Ok(self.list(Some(status))?.len())
    }

    /// Insert a single record in its own session.
    fn insert_one(&self, record: OutboxRecord) -> Result<(), StoreError> {
        let mut session = self.begin()?;
        session.insert(record)?;
        session.commit()
    }
}

impl<S: OutboxStore + ?Sized> OutboxStoreExt for S {}

/// Writes a session has staged but not yet applied.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    pub inserts: Vec<OutboxRecord>,
    pub updates: Vec<OutboxRecord>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    pub fn stage_update(&mut self, records: &[OutboxRecord]) {
        for record in records {
            // A later update of the same id within one session wins.
            match self.updates.iter_mut().find(|staged| staged.id == record.id) {
                Some(staged) => *staged = record.clone(),
                None => self.updates.push(record.clone()),
            }
        }
    }
}
