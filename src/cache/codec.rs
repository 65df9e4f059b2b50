//! Value Codec Module
//!
//! Converts typed values to and from the opaque bytes held by the store.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

// == Codec ==
/// Value serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Compact binary encoding via bincode; round-trips any serde type
    #[default]
    Bincode,
    /// Text encoding via serde_json; values must be JSON-representable
    Json,
}

impl Codec {
    /// The single switch between the two formats.
    pub fn from_use_json(use_json: bool) -> Self {
        if use_json {
            Codec::Json
        } else {
            Codec::Bincode
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Bincode => "bincode",
            Codec::Json => "json",
        }
    }

    // == Encode ==
    /// Serializes `value` to bytes.
    ///
    /// Under JSON, values without a JSON form (such as maps keyed by
    /// non-strings) fail instead of being coerced.
    pub fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Codec::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(|e| self.encode_error(e)),
            Codec::Json => serde_json::to_vec(value).map_err(|e| self.encode_error(e)),
        }
    }

    // == Decode ==
    /// Deserializes stored bytes.
    ///
    /// An empty payload is absent (`Ok(None)`), not an error.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<Option<T>, CodecError>
    where
        T: DeserializeOwned,
    {
        if bytes.is_empty() {
            return Ok(None);
        }
        let value = match self {
            Codec::Bincode => {
                bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|e| self.decode_error(e))?
            }
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| self.decode_error(e))?,
        };
        Ok(Some(value))
    }

    fn encode_error(&self, error: impl std::fmt::Display) -> CodecError {
        CodecError::Encode {
            codec: self.name(),
            message: error.to_string(),
        }
    }

    fn decode_error(&self, error: impl std::fmt::Display) -> CodecError {
        CodecError::Decode {
            codec: self.name(),
            message: error.to_string(),
        }
    }
}
