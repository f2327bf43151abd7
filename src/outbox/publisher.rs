use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OutboxRecord, PayloadCodec, PublishError};
use crate::store::{OutboxSession, OutboxStore};

/// Publisher settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherOptions {
    pub codec: PayloadCodec,
}

/// Records messages in the outbox for later dispatch.
///
/// Every publish is a synchronous durable write; nothing is buffered. Use
/// [`Publisher::publish_in`] to stage the record in a session you already
/// hold, so it commits or rolls back together with the rest of that session.
///
/// ```
/// use outbox_pipeline::{InMemoryOutboxStore, OutboxStoreExt, Publisher};
///
/// let publisher = Publisher::new(InMemoryOutboxStore::new());
/// let record = publisher.publish(&vec!["widget", "gadget"]).unwrap();
///
/// assert!(record.is_pending());
/// assert_eq!(publisher.store().records().unwrap().len(), 1);
/// ```
pub struct Publisher<S> {
    store: S,
    options: PublisherOptions,
}

impl<S: OutboxStore> Publisher<S> {
    /// Publisher with default options (JSON payloads).
    pub fn new(store: S) -> Self {
        Self::with_options(store, PublisherOptions::default())
    }

    /// Publisher with explicit options.
    pub fn with_options(store: S, options: PublisherOptions) -> Self {
        Publisher { store, options }
    }

    /// Override the payload codec.
    pub fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.options.codec = codec;
        self
    }

    /// The store records are written to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current options.
    pub fn options(&self) -> PublisherOptions {
        self.options
    }

    /// Publish a message tagged with its Rust type name.
    pub fn publish<T: Serialize + ?Sized>(&self, message: &T) -> Result<OutboxRecord, PublishError> {
        self.publish_as(std::any::type_name::<T>(), message)
    }

    /// Publish a message under an explicit type tag.
    pub fn publish_as<T: Serialize + ?Sized>(
        &self,
        message_type: &str,
        message: &T,
    ) -> Result<OutboxRecord, PublishError> {
        let record = self.prepare(message_type, message)?;
        self.write(record)
    }

    /// Publish an already-serialized payload.
    pub fn publish_raw(
        &self,
        message_type: &str,
        payload: Vec<u8>,
    ) -> Result<OutboxRecord, PublishError> {
        self.write(OutboxRecord::new(message_type, payload))
    }

    /// Stage a message in a caller-owned session. Nothing is visible until
    /// the caller commits that session.
    pub fn publish_in<T: Serialize + ?Sized>(
        &self,
        session: &mut S::Session,
        message: &T,
    ) -> Result<OutboxRecord, PublishError> {
        let record = self.prepare(std::any::type_name::<T>(), message)?;
        session.insert(record.clone())?;
        debug!(record_id = %record.id, message_type = %record.message_type, "Staged outbox message");
        Ok(record)
    }

    /// Build the record for a message without writing it.
    pub fn prepare<T: Serialize + ?Sized>(
        &self,
        message_type: &str,
        message: &T,
    ) -> Result<OutboxRecord, PublishError> {
        let payload = self
            .options
            .codec
            .encode(message)
            .map_err(|source| PublishError::Encode {
                message_type: message_type.to_string(),
                source,
            })?;
        Ok(OutboxRecord::new(message_type, payload))
    }

    fn write(&self, record: OutboxRecord) -> Result<OutboxRecord, PublishError> {
        let mut session = self.store.begin()?;
        session.insert(record.clone())?;
        session.commit()?;
        debug!(record_id = %record.id, message_type = %record.message_type, "Published outbox message");
        Ok(record)
    }
}
