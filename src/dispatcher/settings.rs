use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::{ConfigError, DispatcherOptions};
use crate::outbox::{PayloadCodec, PublisherOptions};

/// Outbox settings as read from a config file and `OUTBOX_*` environment
/// variables.
///
/// Numbers are signed so that a negative value in the environment reaches
/// validation and is reported, instead of failing deserialization with a
/// less useful message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxSettings {
    pub retry_ceiling: i64,
    pub poll_interval_ms: i64,
    pub batch_size: i64,
    pub codec: PayloadCodec,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            retry_ceiling: 3,
            poll_interval_ms: 5_000,
            batch_size: 100,
            codec: PayloadCodec::Json,
        }
    }
}

impl OutboxSettings {
    /// Load from an optional file, then `OUTBOX_RETRY_CEILING`,
    /// `OUTBOX_POLL_INTERVAL_MS`, `OUTBOX_BATCH_SIZE` and `OUTBOX_CODEC`.
    /// Environment values win over the file; missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, Environment::with_prefix("OUTBOX"))
    }

    pub(crate) fn from_sources(
        path: Option<&Path>,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validated dispatcher options.
    pub fn dispatcher_options(&self) -> Result<DispatcherOptions, ConfigError> {
        DispatcherOptions::try_from(self)
    }

    /// Publisher options; the codec needs no validation.
    pub fn publisher_options(&self) -> PublisherOptions {
        PublisherOptions { codec: self.codec }
    }
}

impl TryFrom<&OutboxSettings> for DispatcherOptions {
    type Error = ConfigError;

    fn try_from(settings: &OutboxSettings) -> Result<Self, Self::Error> {
        let retry_ceiling = u32::try_from(settings.retry_ceiling)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or(ConfigError::InvalidRetryCeiling(settings.retry_ceiling))?;
        let poll_interval_ms = u64::try_from(settings.poll_interval_ms)
            .ok()
            .filter(|&ms| ms > 0)
            .ok_or(ConfigError::InvalidPollInterval(settings.poll_interval_ms))?;
        let batch_size = usize::try_from(settings.batch_size)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or(ConfigError::InvalidBatchSize(settings.batch_size))?;

        Ok(DispatcherOptions {
            retry_ceiling,
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_size,
        })
    }
}
