//! Outbox records and the publish path.
//!
//! An [`OutboxRecord`] is written once by the [`Publisher`] and afterwards
//! only changed by the dispatcher through [`OutboxRecord::mark_completed`]
//! and [`OutboxRecord::record_failure`].

mod codec;
mod error;
mod publisher;
mod record;

pub use codec::PayloadCodec;
pub use error::{CodecError, PublishError};
pub use publisher::{Publisher, PublisherOptions};
pub use record::{OutboxRecord, OutboxStatus, Outcome};
