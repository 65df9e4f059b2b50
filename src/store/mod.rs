//! Store Module
//!
//! The store capability the client is built on: a backend that opens
//! connections, and a connection exposing byte-level key-value commands.

mod entry;
pub mod memory;
mod pattern;
#[cfg(feature = "redis")]
pub mod redis;

use std::fmt;
use std::time::Duration;

use crate::error::StoreError;

pub use entry::StoreEntry;
pub use memory::MemoryBackend;
pub use pattern::{escape_pattern, glob_match};
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

// == PTTL Sentinels ==
/// `PTTL` reply for a key that exists without an expiry
pub const PTTL_NO_EXPIRY: i64 = -1;

/// `PTTL` reply for a key that does not exist
pub const PTTL_MISSING: i64 = -2;

/// Everything a backend needs to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Opens connections to a key-value store.
pub trait StoreBackend: Send + Sync {
    /// Opens a fresh connection. The caller verifies it with a ping.
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// A live connection to the store.
///
/// Values are opaque byte sequences; encoding happens above this layer.
pub trait StoreConnection: Send {
    fn ping(&mut self) -> Result<(), StoreError>;

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// One slot per requested key, `None` for misses.
    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Stores `value`; `ttl` of `None` means no expiry.
    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns how many of `keys` existed.
    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError>;

    /// Glob-style key listing (`*`, `?`, `[...]`).
    fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Remaining lifetime in milliseconds, or one of the `PTTL_*` sentinels.
    fn pttl(&mut self, key: &str) -> Result<i64, StoreError>;
}

// == Ttl ==
/// Remaining lifetime of a key, decoded from the store's `PTTL` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist
    Missing,
    /// The key exists and never expires
    Persistent,
    /// The key expires after the given duration
    Expires(Duration),
}

impl Ttl {
    /// Maps a raw `PTTL` reply onto the two-sentinel convention.
    ///
    /// Unknown negative replies are treated as missing.
    pub fn from_pttl(millis: i64) -> Self {
        match millis {
            PTTL_NO_EXPIRY => Ttl::Persistent,
            m if m >= 0 => Ttl::Expires(Duration::from_millis(m as u64)),
            _ => Ttl::Missing,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Ttl::Missing)
    }
}
