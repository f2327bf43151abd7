//! Transactional outbox with pipeline-based background dispatch.
//!
//! Messages are written durably with a [`Publisher`] and delivered later by a
//! [`Dispatcher`], which runs each pending record through a [`Pipeline`] of
//! steps and tracks retries until the record completes or fails for good.
//! Delivery is at-least-once.

pub mod dispatcher;
#[cfg(feature = "http")]
pub mod http;
pub mod outbox;
pub mod pipeline;
pub mod store;

pub use dispatcher::{
    ConfigError, CycleReport, DispatchError, Dispatcher, DispatcherOptions, DispatcherStats,
    DispatcherThread, OutboxSettings, StopSignal,
};
pub use outbox::{
    CodecError, OutboxRecord, OutboxStatus, Outcome, PayloadCodec, PublishError, Publisher,
    PublisherOptions,
};
#[cfg(feature = "emitter")]
pub use pipeline::EmitterStep;
pub use pipeline::{
    step_fn, DecodeStep, FnStep, LogStep, Pipeline, PipelineBuilder, PipelineError,
    PipelineStep, SaveStep, StepError, TypeRouter,
};
pub use store::{InMemoryOutboxStore, OutboxSession, OutboxStore, OutboxStoreExt, StoreError};
#[cfg(feature = "sqlite")]
pub use store::SqliteOutboxStore;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
