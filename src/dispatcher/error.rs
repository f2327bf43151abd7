use thiserror::Error;

use crate::store::StoreError;

/// Invalid or unloadable dispatcher configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("retry ceiling must be at least 1, got {0}")]
    InvalidRetryCeiling(i64),

    #[error("poll interval must be positive, got {0}ms")]
    InvalidPollInterval(i64),

    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(i64),

    #[error("failed to load outbox settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// A dispatch cycle could not read or persist its batch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}
