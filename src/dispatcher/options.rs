use std::time::Duration;

use super::ConfigError;

/// Knobs for the dispatch loop. Validated once when a
/// [`Dispatcher`](super::Dispatcher) is built and fixed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Failed attempts after which a record becomes `Failed`.
    pub retry_ceiling: u32,
    /// Pause between cycles.
    pub poll_interval: Duration,
    /// Upper bound on records selected per cycle.
    pub batch_size: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        DispatcherOptions {
            retry_ceiling: 3,
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

impl DispatcherOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of failed attempts before a record fails.
    pub fn with_retry_ceiling(mut self, retry_ceiling: u32) -> Self {
        self.retry_ceiling = retry_ceiling;
        self
    }

    /// Set the pause between cycles.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the maximum records per cycle.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reject zero values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_ceiling == 0 {
            return Err(ConfigError::InvalidRetryCeiling(0));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval(0));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(0));
        }
        Ok(())
    }
}
