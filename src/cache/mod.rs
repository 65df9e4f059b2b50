//! Cache Module
//!
//! Key derivation, value codecs, the typed store client and the memoizing
//! wrapper built on them.

mod client;
mod codec;
mod key;
mod memoize;
mod stats;


// Re-export public types
pub use client::StoreClient;
pub use codec::Codec;
pub use key::{digest, namespace_pattern, CacheKey, CallArgs, KeyBuilder, KEY_SEPARATOR};
pub use memoize::{MemoizeOptions, Memoized, Memoizer};
pub use stats::CacheStats;
