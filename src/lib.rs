//! Memo Cache - cache-aside memoization over Redis
//!
//! Turns function calls into cached computations, keeps the store
//! connection alive with exponential backoff, and invalidates results by
//! namespace.
//!
//! ```no_run
//! use std::sync::Arc;
//! use memo_cache::{CallArgs, Config, ConnectionManager, MemoizeOptions, Memoizer, RedisBackend, StoreClient};
//!
//! let manager = ConnectionManager::new(Config::from_env(), RedisBackend::new())?;
//! let client = StoreClient::new(Arc::new(manager));
//! let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("orders"));
//!
//! let total = memo.call_infallible("order_total", &CallArgs::new().arg(42), || 1999u64)?;
//! # Ok::<(), memo_cache::CacheError>(())
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod store;

pub use cache::{
    CacheKey, CacheStats, CallArgs, Codec, KeyBuilder, MemoizeOptions, Memoized, Memoizer,
    StoreClient,
};
pub use config::Config;
pub use connection::{BackoffPolicy, ConnectionManager, ConnectionState};
pub use error::{CacheError, CallError, CodecError, Result, StoreError};
pub use store::{MemoryBackend, StoreBackend, StoreConnection, Ttl};
#[cfg(feature = "redis")]
pub use store::RedisBackend;
