use thiserror::Error;
use uuid::Uuid;

/// Outbox storage error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A lock guarding in-process storage was poisoned by a panicking thread
    #[error("outbox store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// An update referenced a record the store does not hold
    #[error("outbox record {0} not found")]
    NotFound(Uuid),

    /// An insert reused an existing id
    #[error("outbox record {0} already exists")]
    Duplicate(Uuid),

    /// Backend could not be reached
    #[error("outbox store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a record
    #[error("invalid outbox row: {0}")]
    InvalidData(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
