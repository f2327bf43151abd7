use chrono::Utc;
use tracing::{debug, error, warn};

use super::{ConfigError, DispatchError, DispatcherOptions, StopSignal};
use crate::outbox::{OutboxRecord, Outcome};
use crate::pipeline::Pipeline;
use crate::store::{OutboxSession, OutboxStore};

/// Counts from a single dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

impl CycleReport {
    /// Records that went through the pipeline. Less than `selected` only
    /// when the cycle was stopped part-way.
    pub fn processed(&self) -> usize {
        self.completed + self.retried + self.failed
    }
}

/// Totals accumulated by [`Dispatcher::run`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub polls: usize,
    pub cycle_errors: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DispatcherStats {
    fn absorb(&mut self, report: &CycleReport) {
        self.completed += report.completed;
        self.retried += report.retried;
        self.failed += report.failed;
    }
}

/// Drains eligible outbox records through a pipeline.
///
/// Each cycle opens a fresh session, selects up to `batch_size` eligible
/// records oldest first, runs each one through the pipeline and commits every
/// outcome in one write. A cycle that selects nothing writes nothing.
///
/// ```
/// use outbox_pipeline::{
///     step_fn, Dispatcher, DispatcherOptions, InMemoryOutboxStore, OutboxRecord,
///     OutboxStoreExt, Pipeline, Publisher,
/// };
///
/// let store = InMemoryOutboxStore::new();
/// Publisher::new(store.clone()).publish_as("Ping", &"hello").unwrap();
///
/// let pipeline = Pipeline::builder()
///     .step(step_fn("accept", |_: &OutboxRecord| Ok(())))
///     .build();
/// let dispatcher = Dispatcher::new(store.clone(), pipeline, DispatcherOptions::default()).unwrap();
///
/// let report = dispatcher.run_once().unwrap();
/// assert_eq!(report.completed, 1);
/// assert!(store.records().unwrap()[0].is_completed());
/// ```
pub struct Dispatcher<S> {
    store: S,
    pipeline: Pipeline<OutboxRecord>,
    options: DispatcherOptions,
}

impl<S: OutboxStore> Dispatcher<S> {
    /// Create a dispatcher. Fails if `options` do not validate.
    pub fn new(
        store: S,
        pipeline: Pipeline<OutboxRecord>,
        options: DispatcherOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Dispatcher {
            store,
            pipeline,
            options,
        })
    }

    /// The store being drained.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The options this dispatcher was built with.
    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// The pipeline each record runs through.
    pub fn pipeline(&self) -> &Pipeline<OutboxRecord> {
        &self.pipeline
    }

    /// Run one cycle that cannot be interrupted.
    pub fn run_once(&self) -> Result<CycleReport, DispatchError> {
        self.run_cycle(&StopSignal::new())
    }

    /// Run one cycle.
    ///
    /// `stop` is checked before each record. The record in flight always
    /// finishes, and outcomes already reached are committed before returning.
    /// On a store error nothing from this cycle is persisted.
    pub fn run_cycle(&self, stop: &StopSignal) -> Result<CycleReport, DispatchError> {
        let mut session = self.store.begin()?;
        let batch = session.eligible(self.options.retry_ceiling, self.options.batch_size)?;

        let mut report = CycleReport {
            selected: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let mut processed = Vec::with_capacity(batch.len());
        for mut record in batch {
            if stop.is_cancelled() {
                debug!(remaining = report.selected - processed.len(), "Dispatch cycle stopped early");
                break;
            }

            match self.attempt(&mut record) {
                Outcome::Completed => report.completed += 1,
                Outcome::Retry => report.retried += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Unchanged => continue,
            }
            processed.push(record);
        }

        if !processed.is_empty() {
            session.update(&processed)?;
            session.commit()?;
        }

        debug!(
            selected = report.selected,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            "Dispatch cycle finished"
        );
        Ok(report)
    }

    fn attempt(&self, record: &mut OutboxRecord) -> Outcome {
        match self.pipeline.process(record) {
            Ok(()) => record.mark_completed(Utc::now()),
            Err(err) => {
                let outcome =
                    record.record_failure(err.reason(), Utc::now(), self.options.retry_ceiling);
                match outcome {
                    Outcome::Retry => warn!(
                        record_id = %record.id,
                        message_type = %record.message_type,
                        retry_count = record.retry_count,
                        step = err.step,
                        error = %err,
                        "Outbox message failed, will retry"
                    ),
                    Outcome::Failed => error!(
                        record_id = %record.id,
                        message_type = %record.message_type,
                        retry_count = record.retry_count,
                        step = err.step,
                        error = %err,
                        "Outbox message failed permanently"
                    ),
                    _ => {}
                }
                outcome
            }
        }
    }

    /// Run cycles until `stop` is cancelled, sleeping `poll_interval` between
    /// them. Cycle errors are logged and counted; the loop keeps going.
    pub fn run(&self, stop: &StopSignal) -> DispatcherStats {
        let mut stats = DispatcherStats::default();

        while !stop.is_cancelled() {
            stats.polls += 1;
            match self.run_cycle(stop) {
                Ok(report) => stats.absorb(&report),
                Err(err) => {
                    stats.cycle_errors += 1;
                    error!(error = %err, "Outbox dispatch cycle failed");
                }
            }

            if stop.wait_timeout(self.options.poll_interval) {
                break;
            }
        }

        debug!(polls = stats.polls, cycle_errors = stats.cycle_errors, "Dispatcher stopped");
        stats
    }
}
