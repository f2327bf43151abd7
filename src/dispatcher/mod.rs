//! Background dispatch of outbox records.
//!
//! A [`Dispatcher`] runs cycles of select, process and commit against an
//! [`OutboxStore`](crate::store::OutboxStore). [`DispatcherThread`] runs that
//! loop on a dedicated thread until its [`StopSignal`] is cancelled.

mod error;
mod options;
mod settings;
mod signal;
mod thread;
mod worker;

pub use error::{ConfigError, DispatchError};
pub use options::DispatcherOptions;
pub use settings::OutboxSettings;
pub use signal::StopSignal;
pub use thread::DispatcherThread;
pub use worker::{CycleReport, Dispatcher, DispatcherStats};
