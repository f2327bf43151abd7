//! SQLite-backed outbox store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::{OutboxSession, OutboxStore, StagedWrites, StoreError};
use crate::outbox::{OutboxRecord, OutboxStatus};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

const SELECT_COLUMNS: &str = "SELECT id, message_type, payload, status, is_processed, created_at, processed_at, retry_count, last_error, last_error_at
     FROM outbox_messages";

/// Outbox store persisted in a SQLite database.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct SqliteOutboxStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOutboxStore {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned(operation))
    }
}

impl OutboxStore for SqliteOutboxStore {
    type Session = SqliteSession;

    fn begin(&self) -> Result<Self::Session, StoreError> {
        Ok(SqliteSession {
            conn: Arc::clone(&self.conn),
            staged: StagedWrites::default(),
        })
    }

    fn find(&self, id: Uuid) -> Result<Option<OutboxRecord>, StoreError> {
        let conn = self.lock("find")?;
        let mut stmt = conn.prepare_cached(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let raw = stmt
            .query_row(params![id.to_string()], RawRow::from_row)
            .optional()?;
        raw.map(RawRow::into_record).transpose()
    }

    fn list(&self, status: Option<OutboxStatus>) -> Result<Vec<OutboxRecord>, StoreError> {
        let conn = self.lock("list")?;
        let mut stmt = conn.prepare_cached(&format!(
            "{SELECT_COLUMNS} WHERE ?1 IS NULL OR status = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt
            .query_map(params![status.map(|s| s.as_str())], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }
}

/// Session over a [`SqliteOutboxStore`]. Staged writes are applied in one
/// SQLite transaction on commit.
pub struct SqliteSession {
    conn: Arc<Mutex<Connection>>,
    staged: StagedWrites,
}

impl OutboxSession for SqliteSession {
    fn insert(&mut self, record: OutboxRecord) -> Result<(), StoreError> {
        self.staged.inserts.push(record);
        Ok(())
    }

    fn eligible(
        &mut self,
        retry_ceiling: u32,
        limit: usize,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned("eligible"))?;
        let mut stmt = conn.prepare_cached(&format!(
            "{SELECT_COLUMNS}
             WHERE is_processed = 0 AND status = 'Pending' AND retry_count < ?1
             ORDER BY created_at ASC, seq ASC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![retry_ceiling, limit as i64], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    fn update(&mut self, records: &[OutboxRecord]) -> Result<(), StoreError> {
        self.staged.stage_update(records);
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;
        let tx = conn.transaction()?;

        for record in &self.staged.inserts {
            let inserted = tx.execute(
                "INSERT INTO outbox_messages (id, message_type, payload, status, is_processed, created_at, processed_at, retry_count, last_error, last_error_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id.to_string(),
                    record.message_type,
                    record.payload,
                    record.status.as_str(),
                    record.is_processed,
                    format_time(record.created_at),
                    record.processed_at.map(format_time),
                    record.retry_count,
                    record.last_error,
                    record.last_error_at.map(format_time),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Duplicate(record.id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        for record in &self.staged.updates {
            let changed = tx.execute(
                "UPDATE outbox_messages
                 SET status = ?1, is_processed = ?2, processed_at = ?3, retry_count = ?4, last_error = ?5, last_error_at = ?6
                 WHERE id = ?7",
                params![
                    record.status.as_str(),
                    record.is_processed,
                    record.processed_at.map(format_time),
                    record.retry_count,
                    record.last_error,
                    record.last_error_at.map(format_time),
                    record.id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(record.id));
            }
        }

        tx.commit()?;
        debug!(
            inserted = self.staged.inserts.len(),
            updated = self.staged.updates.len(),
            "Committed outbox session"
        );
        Ok(())
    }
}

/// Run all pending migrations.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS outbox_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM outbox_migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version < 1 {
        info!(target_version = CURRENT_VERSION, "Creating outbox schema");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS outbox_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                message_type TEXT NOT NULL,
                payload BLOB NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending',
                is_processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                processed_at TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_error_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_outbox_messages_eligible
                ON outbox_messages (status, is_processed, retry_count, created_at);

            INSERT INTO outbox_migrations (version, name) VALUES (1, 'outbox_messages');
        ",
        )?;
    }

    Ok(())
}

/// Fixed-width RFC 3339 so text order matches time order.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("timestamp {value:?}: {e}")))
}

/// Column values as stored, before validation.
struct RawRow {
    id: String,
    message_type: String,
    payload: Vec<u8>,
    status: String,
    is_processed: bool,
    created_at: String,
    processed_at: Option<String>,
    retry_count: i64,
    last_error: Option<String>,
    last_error_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawRow {
            id: row.get(0)?,
            message_type: row.get(1)?,
            payload: row.get(2)?,
            status: row.get(3)?,
            is_processed: row.get(4)?,
            created_at: row.get(5)?,
            processed_at: row.get(6)?,
            retry_count: row.get(7)?,
            last_error: row.get(8)?,
            last_error_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<OutboxRecord, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::InvalidData(format!("id {:?}: {e}", self.id)))?;
        let status = OutboxStatus::parse(&self.status)
            .ok_or_else(|| StoreError::InvalidData(format!("status {:?}", self.status)))?;
        let retry_count = u32::try_from(self.retry_count)
            .map_err(|_| StoreError::InvalidData(format!("retry_count {}", self.retry_count)))?;

        Ok(OutboxRecord {
            id,
            message_type: self.message_type,
            payload: self.payload,
            status,
            is_processed: self.is_processed,
            created_at: parse_time(&self.created_at)?,
            processed_at: self.processed_at.as_deref().map(parse_time).transpose()?,
            retry_count,
            last_error: self.last_error,
            last_error_at: self.last_error_at.as_deref().map(parse_time).transpose()?,
        })
    }
}
