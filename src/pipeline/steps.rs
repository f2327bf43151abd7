//! Ready-made steps.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tracing::info;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;

use super::{Pipeline, PipelineStep, StepError};
use crate::outbox::{OutboxRecord, PayloadCodec};
use crate::store::{OutboxStore, OutboxStoreExt};

/// Adapts a closure into a named step.
pub struct FnStep<M: ?Sized, F> {
    name: &'static str,
    f: F,
    _message: PhantomData<fn(&M)>,
}

/// Build a step from a closure.
pub fn step_fn<M, F>(name: &'static str, f: F) -> FnStep<M, F>
where
    M: ?Sized,
    F: Fn(&M) -> Result<(), StepError> + Send + Sync,
{
    FnStep {
        name,
        f,
        _message: PhantomData,
    }
}

impl<M, F> PipelineStep<M> for FnStep<M, F>
where
    M: ?Sized,
    F: Fn(&M) -> Result<(), StepError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&self, message: &M) -> Result<(), StepError> {
        (self.f)(message)
    }
}

/// Writes each record as a log line, either to `tracing` or to a shared
/// buffer (handy in tests).
#[derive(Default)]
pub struct LogStep {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogStep {
    /// Log through `tracing` at info level.
    pub fn new() -> Self {
        LogStep { buffer: None }
    }

    /// Append lines to `buffer` instead of logging.
    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogStep {
            buffer: Some(buffer),
        }
    }
}

impl PipelineStep<OutboxRecord> for LogStep {
    fn execute(&self, record: &OutboxRecord) -> Result<(), StepError> {
        let payload = String::from_utf8_lossy(&record.payload);
        match &self.buffer {
            Some(buffer) => {
                let mut buffer = buffer
                    .lock()
                    .map_err(|_| StepError::new("log buffer poisoned"))?;
                buffer.push(format!("[OUTBOX] {} {} {}", record.id, record.message_type, payload));
            }
            None => {
                info!(
                    record_id = %record.id,
                    message_type = %record.message_type,
                    payload = %payload,
                    "Outbox message"
                );
            }
        }
        Ok(())
    }
}

/// Persists each record into an outbox store in its own session.
///
/// Put it last in an intake pipeline so that earlier steps can reject a
/// message before anything is written.
pub struct SaveStep<S> {
    store: S,
}

impl<S: OutboxStore> SaveStep<S> {
    /// Save into `store`.
    pub fn new(store: S) -> Self {
        SaveStep { store }
    }

    /// The store records are saved into.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: OutboxStore> PipelineStep<OutboxRecord> for SaveStep<S> {
    fn name(&self) -> &'static str {
        "save"
    }

    fn execute(&self, record: &OutboxRecord) -> Result<(), StepError> {
        self.store
            .insert_one(record.clone())
            .map_err(StepError::from_source)
    }
}

/// Decodes a record's payload into `T` and runs a typed pipeline over it.
///
/// Records whose `message_type` differs from the expected tag are rejected,
/// so a misrouted record fails loudly instead of being decoded as the wrong
/// type.
pub struct DecodeStep<T> {
    message_type: String,
    codec: PayloadCodec,
    pipeline: Pipeline<T>,
}

impl<T: DeserializeOwned + 'static> DecodeStep<T> {
    /// Expect the tag the publisher derives for `T`.
    pub fn new(pipeline: Pipeline<T>) -> Self {
        DecodeStep {
            message_type: std::any::type_name::<T>().to_string(),
            codec: PayloadCodec::default(),
            pipeline,
        }
    }

    /// Expect a custom tag instead of the type name.
    pub fn with_message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = message_type.into();
        self
    }

    /// Decode payloads with `codec` (JSON by default).
    pub fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// The tag records must carry.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

impl<T: DeserializeOwned + 'static> PipelineStep<OutboxRecord> for DecodeStep<T> {
    fn execute(&self, record: &OutboxRecord) -> Result<(), StepError> {
        if record.message_type != self.message_type {
            return Err(StepError::new(format!(
                "expected message type {}, got {}",
                self.message_type, record.message_type
            )));
        }

        let message: T = self.codec.decode(&record.payload).map_err(|e| {
            StepError::with_source(format!("undecodable {} payload", record.message_type), e)
        })?;

        self.pipeline.process(&message).map_err(|e| {
            let reason = format!("{}: {}", e.step, e.reason());
            StepError::with_source(reason, e)
        })
    }
}

/// Dispatches each record to the step registered for its `message_type`.
#[derive(Default)]
pub struct TypeRouter {
    routes: HashMap<String, Box<dyn PipelineStep<OutboxRecord>>>,
}

impl TypeRouter {
    /// A router with no routes; every record fails until one is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send records tagged `message_type` to `step`.
    pub fn route<S>(mut self, message_type: impl Into<String>, step: S) -> Self
    where
        S: PipelineStep<OutboxRecord> + 'static,
    {
        self.routes.insert(message_type.into(), Box::new(step));
        self
    }

    /// Register a typed pipeline under the tag the publisher derives for `T`.
    pub fn typed<T: DeserializeOwned + 'static>(self, pipeline: Pipeline<T>) -> Self {
        let step = DecodeStep::new(pipeline);
        let message_type = step.message_type().to_string();
        self.route(message_type, step)
    }

    /// Registered tags, in no particular order.
    pub fn message_types(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}

impl PipelineStep<OutboxRecord> for TypeRouter {
    fn execute(&self, record: &OutboxRecord) -> Result<(), StepError> {
        match self.routes.get(&record.message_type) {
            Some(step) => step.execute(record),
            None => Err(StepError::new(format!(
                "no route for message type {}",
                record.message_type
            ))),
        }
    }
}

/// Fans each record out to in-process listeners keyed by `message_type`.
/// Listeners receive the payload as a string.
#[cfg(feature = "emitter")]
pub struct EmitterStep {
    emitter: Mutex<EventEmitter>,
}

#[cfg(feature = "emitter")]
impl EmitterStep {
    /// Emit on `emitter`.
    pub fn new(emitter: EventEmitter) -> Self {
        EmitterStep {
            emitter: Mutex::new(emitter),
        }
    }
}

#[cfg(feature = "emitter")]
impl PipelineStep<OutboxRecord> for EmitterStep {
    fn execute(&self, record: &OutboxRecord) -> Result<(), StepError> {
        let payload = String::from_utf8_lossy(&record.payload).into_owned();
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| StepError::new("event emitter poisoned"))?;
        emitter.emit(&record.message_type, payload);
        Ok(())
    }
}
