use thiserror::Error;

use crate::store::StoreError;

/// Payload could not be encoded or decoded.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bitcode codec: {0}")]
    Bitcode(#[from] bitcode::Error),
}

/// Publishing a message failed; nothing was written.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("payload for {message_type} could not be serialized: {source}")]
    Encode {
        message_type: String,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
