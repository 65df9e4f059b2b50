//! Store Client Module
//!
//! Value-level operations over the managed connection. Transport faults are
//! logged and reported as absent results; encoding faults and faults during
//! administrative bulk deletes are returned to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use super::key::{namespace_pattern, KEY_SEPARATOR};
use super::Codec;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::store::{escape_pattern, Ttl};

// == Store Client ==
/// Typed get/set/delete over a shared [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct StoreClient {
    manager: Arc<ConnectionManager>,
    codec: Codec,
    key_prefix: Option<String>,
    default_ttl: Duration,
}

impl StoreClient {
    // == Constructor ==
    /// Creates a client using the manager's key prefix and default TTL and
    /// the binary codec.
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        let config = manager.config();
        let key_prefix = config.key_prefix.clone();
        let default_ttl = config.default_ttl();
        Self {
            manager,
            codec: Codec::default(),
            key_prefix,
            default_ttl,
        }
    }

    /// A client sharing this one's connection but encoding with `codec`.
    pub fn with_codec(&self, codec: Codec) -> Self {
        Self {
            codec,
            ..self.clone()
        }
    }

    // == Codec ==
    /// Codec used for values written and read by this client.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    // == Manager ==
    /// The shared connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    // == Default TTL ==
    /// Lifetime applied by [`set`](Self::set) when no TTL is given.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Applies the configured key prefix.
    pub fn make_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}{}", prefix, KEY_SEPARATOR, key),
            None => key.to_string(),
        }
    }

    /// Applies the key prefix to a glob pattern, escaping the prefix itself.
    fn make_pattern(&self, pattern: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}{}", escape_pattern(prefix), KEY_SEPARATOR, pattern),
            None => pattern.to_string(),
        }
    }

    fn strip_key(&self, store_key: String) -> String {
        match &self.key_prefix {
            Some(prefix) => store_key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
                .map(str::to_string)
                .unwrap_or(store_key),
            None => store_key,
        }
    }

    // == Get ==
    /// Returns the decoded value, or `None` when the key is missing or the
    /// store cannot be reached.
    ///
    /// The two cases are indistinguishable here; use [`ttl`](Self::ttl) or
    /// the manager's health check when that matters.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let store_key = self.make_key(key);
        let start = Instant::now();
        match self.manager.with_connection(|conn| conn.get(&store_key)) {
            Ok(Some(bytes)) => {
                debug!("Store took {:?} to retrieve key {}", start.elapsed(), key);
                Ok(self.codec.decode(&bytes)?)
            }
            Ok(None) => {
                debug!("Key {} not found", key);
                Ok(None)
            }
            Err(err) => {
                error!("Error while getting key {}: {}", key, err);
                Ok(None)
            }
        }
    }

    // == Multi Get ==
    /// Fetches several keys in one round trip. Misses are omitted.
    ///
    /// A transport fault yields an empty map; there is no partial result.
    pub fn multi_get<T, K>(&self, keys: &[K]) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let store_keys: Vec<String> = keys.iter().map(|k| self.make_key(k.as_ref())).collect();
        let values = match self.manager.with_connection(|conn| conn.mget(&store_keys)) {
            Ok(values) => values,
            Err(err) => {
                error!("Error while getting multiple keys: {}", err);
                return Ok(HashMap::new());
            }
        };

        let mut found = HashMap::with_capacity(keys.len());
        for (key, bytes) in keys.iter().zip(values) {
            if let Some(value) = bytes.map(|b| self.codec.decode(&b)).transpose()?.flatten() {
                found.insert(key.as_ref().to_string(), value);
            }
        }
        Ok(found)
    }

    // == Set ==
    /// Encodes and stores `value` for `ttl` (the default TTL when `None`).
    ///
    /// Encoding faults are returned. A transport fault drops the write after
    /// logging it, so `Ok` does not prove durability.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        self.store(key, value, Some(ttl.unwrap_or(self.default_ttl)))
    }

    /// Like [`set`](Self::set) but without any expiry.
    pub fn set_persistent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.store(key, value, None)
    }

    fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let bytes = self.codec.encode(value)?;
        let store_key = self.make_key(key);
        let start = Instant::now();
        match self
            .manager
            .with_connection(|conn| conn.set(&store_key, &bytes, ttl))
        {
            Ok(()) => debug!(
                "Successfully set {} ({} bytes) in {:?}",
                key,
                bytes.len(),
                start.elapsed()
            ),
            Err(err) => error!("Error while setting key {}: {}", key, err),
        }
        Ok(())
    }

    // == Delete ==
    /// Removes `key`. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) {
        let store_key = self.make_key(key);
        match self
            .manager
            .with_connection(|conn| conn.delete(std::slice::from_ref(&store_key)))
        {
            Ok(_) => debug!("Successfully deleted key {}", key),
            Err(err) => error!("Error while deleting key {}: {}", key, err),
        }
    }

    // == Delete All ==
    /// Deletes every key in the store, regardless of prefix or namespace.
    ///
    /// Administrative and destructive; faults are returned, not swallowed.
    pub fn delete_all(&self) -> Result<u64> {
        self.delete_matching("*")
    }

    // == Delete Namespace ==
    /// Deletes every key under `namespace`. Faults are returned.
    pub fn delete_namespace(&self, namespace: &str) -> Result<u64> {
        let pattern = self.make_pattern(&namespace_pattern(namespace));
        self.delete_matching(&pattern)
    }

    fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let keys = self.manager.with_connection(|conn| conn.keys(pattern))?;
        if keys.is_empty() {
            info!("No keys found in store matching {}", pattern);
            return Ok(0);
        }
        let deleted = self.manager.with_connection(|conn| conn.delete(&keys))?;
        info!("Deleted {} keys matching {}", deleted, pattern);
        Ok(deleted)
    }

    // == Keys ==
    /// Lists keys matching `pattern` (prefix applied and stripped).
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let store_pattern = self.make_pattern(pattern);
        let start = Instant::now();
        match self.manager.with_connection(|conn| conn.keys(&store_pattern)) {
            Ok(keys) => {
                debug!("Store took {:?} to list keys {}", start.elapsed(), pattern);
                keys.into_iter().map(|k| self.strip_key(k)).collect()
            }
            Err(err) => {
                error!("Error while listing keys {}: {}", pattern, err);
                Vec::new()
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ttl(key).exists()
    }

    // == TTL ==
    /// Remaining lifetime of `key`. A transport fault reads as missing.
    pub fn ttl(&self, key: &str) -> Ttl {
        let store_key = self.make_key(key);
        match self.manager.with_connection(|conn| conn.pttl(&store_key)) {
            Ok(millis) => Ttl::from_pttl(millis),
            Err(err) => {
                error!("Error while reading ttl of key {}: {}", key, err);
                Ttl::Missing
            }
        }
    }

    /// True when `key` no longer exists in the store.
    pub fn is_expired(&self, key: &str) -> bool {
        self.ttl(key) == Ttl::Missing
    }
}
