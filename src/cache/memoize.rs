//! Memoization Module
//!
//! Cache-aside wrapper around arbitrary computations: look the call up in
//! the store, compute on a miss, store the result.
//!
//! Concurrent misses for the same key are not coordinated. Each caller
//! computes and writes, and the last write wins.

use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{CacheKey, CacheStats, CallArgs, Codec, KeyBuilder, StoreClient};
use crate::error::{CacheError, CallError, Result};

// == Memoize Options ==
/// Per-wrapper settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoizeOptions {
    /// Key namespace; falls back to the configured default namespace
    pub namespace: Option<String>,
    /// Lifetime of stored results; falls back to the configured default TTL
    pub ttl: Option<Duration>,
    /// Key on the first positional argument only
    pub ignore_args: bool,
    /// Store results as JSON instead of bincode
    pub use_json: bool,
}

impl MemoizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ignore_args(mut self, ignore_args: bool) -> Self {
        self.ignore_args = ignore_args;
        self
    }

    pub fn use_json(mut self, use_json: bool) -> Self {
        self.use_json = use_json;
        self
    }
}

// == Memoizer ==
/// Runs computations through the cache.
#[derive(Debug)]
pub struct Memoizer {
    client: StoreClient,
    keys: KeyBuilder,
    namespace: Option<String>,
    ttl: Option<Duration>,
    ignore_args: bool,
    stats: Mutex<CacheStats>,
}

impl Memoizer {
    // == Constructor ==
    /// Creates a memoizer over `client`'s connection.
    ///
    /// The codec follows `options.use_json`; key hashing follows the
    /// connection's configuration.
    pub fn new(client: &StoreClient, options: MemoizeOptions) -> Self {
        let config = client.manager().config();
        let codec = Codec::from_use_json(options.use_json);
        Self {
            keys: KeyBuilder::new(config.hash_keys, codec),
            namespace: options.namespace.or_else(|| config.namespace.clone()),
            client: client.with_codec(codec),
            ttl: options.ttl,
            ignore_args: options.ignore_args,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> CacheStats {
        self.lock_stats().clone()
    }

    /// The key a call would be cached under.
    pub fn key_for(&self, function_id: &str, args: &CallArgs) -> Result<CacheKey> {
        self.keys
            .build(self.namespace(), self.ignore_args, function_id, args)
    }

    // == Call ==
    /// Returns the cached result for this call, or computes and caches it.
    ///
    /// # Behavior
    /// - Store unhealthy: `compute` runs directly, nothing is cached.
    /// - Hit: the stored value is returned and `compute` does not run.
    /// - Miss or swallowed lookup fault: `compute` runs and a successful
    ///   result is stored; store faults on that write are logged only.
    ///
    /// # Errors
    /// - `CallError::Computation` carries `compute`'s error unchanged
    /// - `CallError::Cache` when the key or result cannot be encoded
    pub fn call<T, E, F>(&self, function_id: &str, args: &CallArgs, compute: F) -> std::result::Result<T, CallError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if !self.client.manager().ping() {
            debug!("Store unavailable, computing {} directly", function_id);
            self.lock_stats().record_bypass();
            return compute().map_err(CallError::Computation);
        }

        let key = self.key_for(function_id, args)?;

        let start = Instant::now();
        match self.client.get::<T>(key.as_str()) {
            Ok(Some(value)) => {
                debug!("Cache hit for {} in {:?}", key, start.elapsed());
                self.lock_stats().record_hit();
                return Ok(value);
            }
            Ok(None) => debug!("Cache miss for {}", key),
            Err(err) => {
                warn!("Treating unreadable entry {} as a miss: {}", key, err);
                self.lock_stats().record_fetch_error();
            }
        }
        self.lock_stats().record_miss();

        let value = compute().map_err(CallError::Computation)?;

        let start = Instant::now();
        self.client.set(key.as_str(), &value, self.ttl)?;
        debug!("Cached {} in {:?}", key, start.elapsed());

        Ok(value)
    }

    /// [`call`](Self::call) for computations that cannot fail.
    pub fn call_infallible<T, F>(&self, function_id: &str, args: &CallArgs, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.call(function_id, args, || Ok::<T, Infallible>(compute()))
            .map_err(|err| match err {
                CallError::Computation(never) => match never {},
                CallError::Cache(err) => err,
            })
    }

    /// Binds a computation to a function identity.
    pub fn wrap<F>(&self, function_id: impl Into<String>, compute: F) -> Memoized<'_, F> {
        Memoized {
            memoizer: self,
            function_id: function_id.into(),
            compute,
        }
    }

    // == Invalidate ==
    /// Drops the cached result of one call.
    pub fn invalidate(&self, function_id: &str, args: &CallArgs) -> Result<()> {
        let key = self.key_for(function_id, args)?;
        self.client.delete(key.as_str());
        Ok(())
    }

    /// Drops every cached result in this memoizer's namespace.
    pub fn invalidate_all(&self) -> Result<u64> {
        match self.namespace() {
            Some(namespace) => self.client.delete_namespace(namespace),
            None => Err(CacheError::InvalidConfig(
                "memoizer has no namespace to invalidate".to_string(),
            )),
        }
    }

    fn lock_stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// == Memoized ==
/// A computation over [`CallArgs`] bound to a function identity.
pub struct Memoized<'a, F> {
    memoizer: &'a Memoizer,
    function_id: String,
    compute: F,
}

impl<'a, F> Memoized<'a, F> {
    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn call<T, E>(&self, args: &CallArgs) -> std::result::Result<T, CallError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&CallArgs) -> std::result::Result<T, E>,
    {
        self.memoizer
            .call(&self.function_id, args, || (self.compute)(args))
    }
}
