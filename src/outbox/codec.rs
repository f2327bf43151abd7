use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::CodecError;

/// Serialization format for outbox payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCodec {
    /// UTF-8 JSON text, readable straight out of the store.
    #[default]
    Json,
    /// Compact binary via bitcode.
    Bitcode,
}

impl PayloadCodec {
    /// Serialize `value` to payload bytes.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            PayloadCodec::Json => Ok(serde_json::to_vec(value)?),
            PayloadCodec::Bitcode => Ok(bitcode::serialize(value)?),
        }
    }

    /// Deserialize payload bytes into `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            PayloadCodec::Json => Ok(serde_json::from_slice(bytes)?),
            PayloadCodec::Bitcode => Ok(bitcode::deserialize(bytes)?),
        }
    }
}
