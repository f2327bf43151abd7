use std::error::Error as StdError;

use thiserror::Error;

/// A pipeline step could not process a message.
///
/// The display text is the reason alone; it is what ends up in an outbox
/// record's `last_error`.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct StepError {
    reason: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StepError {
    /// A failure with a reason and no underlying cause.
    pub fn new(reason: impl Into<String>) -> Self {
        StepError {
            reason: reason.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, using its display text as the reason.
    pub fn from_source<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        StepError {
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// A failure with its own reason, keeping `source` for the error chain.
    pub fn with_source<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        StepError {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable reason; stored as the record's `last_error`.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A pipeline run stopped at a failing step.
#[derive(Error, Debug)]
#[error("step {index} ({step}) failed: {source}")]
pub struct PipelineError {
    pub step: &'static str,
    pub index: usize,
    #[source]
    pub source: StepError,
}

impl PipelineError {
    /// The failing step's reason, without step context.
    pub fn reason(&self) -> &str {
        self.source.reason()
    }
}
