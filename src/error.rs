//! Error types for the cache client
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error ==
/// Faults raised by the store capability (connection, protocol, timeouts).
///
/// These never escape the client on the memoization path: they are logged
/// and turned into an absent result or a failed health check.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No live connection handle is held
    #[error("Not connected to the store")]
    NotConnected,

    /// The store refused or dropped the connection
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other transport or protocol fault reported by the backend
    #[error("Store transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// == Codec Error ==
/// A value could not be converted to or from its stored byte form.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Value is not representable by the active codec
    #[error("{codec} encoding failed: {message}")]
    Encode {
        codec: &'static str,
        message: String,
    },

    /// Stored bytes could not be decoded into the requested type
    #[error("{codec} decoding failed: {message}")]
    Decode {
        codec: &'static str,
        message: String,
    },
}

// == Cache Error ==
/// Unified error type for the cache client.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Transport fault surfaced by an administrative operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Encoding fault, always visible to the caller
    #[error(transparent)]
    Encoding(#[from] CodecError),

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Call Error ==
/// Outcome of a failed memoized call.
///
/// The computation's own error is carried unchanged in `Computation`.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The wrapped computation failed
    #[error("{0}")]
    Computation(E),

    /// The computed value could not be cached
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl<E> CallError<E> {
    /// Returns the computation error, if that is what failed.
    pub fn into_computation(self) -> Option<E> {
        match self {
            CallError::Computation(err) => Some(err),
            CallError::Cache(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache client.
pub type Result<T> = std::result::Result<T, CacheError>;
