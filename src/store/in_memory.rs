use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::{OutboxSession, OutboxStore, StagedWrites, StoreError};
use crate::outbox::{OutboxRecord, OutboxStatus};

#[derive(Default)]
struct Table {
    /// Insertion order.
    rows: Vec<OutboxRecord>,
    index: HashMap<Uuid, usize>,
}

/// In-memory outbox store for tests and single-process use.
///
/// Cloning yields another handle to the same storage.
///
/// ```
/// use outbox_pipeline::{InMemoryOutboxStore, OutboxRecord, OutboxStoreExt};
///
/// let store = InMemoryOutboxStore::new();
/// store.insert_one(OutboxRecord::new("OrderPlaced", b"{}".to_vec())).unwrap();
/// assert_eq!(store.records().unwrap().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    table: Arc<RwLock<Table>>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryOutboxStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits that wrote at least one record.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Whether no records have been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutboxStore for InMemoryOutboxStore {
    type Session = InMemorySession;

    fn begin(&self) -> Result<Self::Session, StoreError> {
        Ok(InMemorySession {
            table: Arc::clone(&self.table),
            commits: Arc::clone(&self.commits),
            staged: StagedWrites::default(),
        })
    }

    fn find(&self, id: Uuid) -> Result<Option<OutboxRecord>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::LockPoisoned("find"))?;
        Ok(table.index.get(&id).map(|&i| table.rows[i].clone()))
    }

    fn list(&self, status: Option<OutboxStatus>) -> Result<Vec<OutboxRecord>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::LockPoisoned("list"))?;
        Ok(table
            .rows
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }
}

/// Session over an [`InMemoryOutboxStore`].
pub struct InMemorySession {
    table: Arc<RwLock<Table>>,
    commits: Arc<AtomicUsize>,
    staged: StagedWrites,
}

impl OutboxSession for InMemorySession {
    fn insert(&mut self, record: OutboxRecord) -> Result<(), StoreError> {
        self.staged.inserts.push(record);
        Ok(())
    }

    fn eligible(
        &mut self,
        retry_ceiling: u32,
        limit: usize,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::LockPoisoned("eligible"))?;

        let mut eligible: Vec<&OutboxRecord> = table
            .rows
            .iter()
            .filter(|r| r.is_eligible(retry_ceiling))
            .collect();
        // Stable: equal timestamps keep insertion order.
        eligible.sort_by_key(|r| r.created_at);

        Ok(eligible.into_iter().take(limit).cloned().collect())
    }

    fn update(&mut self, records: &[OutboxRecord]) -> Result<(), StoreError> {
        self.staged.stage_update(records);
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let mut table = self
            .table
            .write()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;

        // Validate everything before touching the table.
        let mut seen = std::collections::HashSet::new();
        for record in &self.staged.inserts {
            if table.index.contains_key(&record.id) || !seen.insert(record.id) {
                return Err(StoreError::Duplicate(record.id));
            }
        }
        for record in &self.staged.updates {
            if !table.index.contains_key(&record.id) && !seen.contains(&record.id) {
                return Err(StoreError::NotFound(record.id));
            }
        }

        let StagedWrites { inserts, updates } = self.staged;
        for record in inserts {
            let position = table.rows.len();
            table.index.insert(record.id, position);
            table.rows.push(record);
        }
        for record in updates {
            if let Some(&i) = table.index.get(&record.id) {
                table.rows[i] = record;
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
