//! Step pipelines.
//!
//! A [`Pipeline`] runs an ordered list of [`PipelineStep`]s against a single
//! message and stops at the first failure. It does not retry: retrying is the
//! dispatcher's job and always restarts the whole pipeline.
//!
//! ## Example
//!
//! ```ignore
//! use outbox_pipeline::{Pipeline, TypeRouter, LogStep};
//!
//! let orders = Pipeline::<OrderMessage>::builder()
//!     .step(ValidationStep)
//!     .step(PaymentStep::new(gateway))
//!     .build();
//!
//! let pipeline = Pipeline::builder()
//!     .step(LogStep::new())
//!     .step(TypeRouter::new().typed(orders))
//!     .build();
//! ```

mod error;
mod executor;
mod step;
mod steps;

pub use error::{PipelineError, StepError};
pub use executor::{Pipeline, PipelineBuilder};
pub use step::PipelineStep;
#[cfg(feature = "emitter")]
pub use steps::EmitterStep;
pub use steps::{step_fn, DecodeStep, FnStep, LogStep, SaveStep, TypeRouter};
