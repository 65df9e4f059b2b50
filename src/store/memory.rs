//! In-Process Store Backend
//!
//! A HashMap-backed implementation of the store capability with TTL expiry,
//! glob key listing and switchable availability. Used to embed the client
//! without a server and to exercise outage handling in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::{glob_match, ConnectionParams, StoreBackend, StoreConnection, StoreEntry, PTTL_MISSING};
use crate::error::StoreError;

#[derive(Debug)]
struct Shared {
    /// Key-value storage
    entries: Mutex<HashMap<String, StoreEntry>>,
    /// When false every connect and command is refused
    available: AtomicBool,
    /// Outages so far; a connection dies once this moves past its own count
    outages: AtomicU32,
    /// Connect attempts that will be refused before availability is consulted
    refuse_connects: AtomicU32,
    /// Total connect attempts seen
    connect_attempts: AtomicU32,
}

// == Memory Backend ==
/// In-process store. Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty, available store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                outages: AtomicU32::new(0),
                refuse_connects: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Makes the store reachable or unreachable.
    ///
    /// Going down drops every open connection for good, as a server restart
    /// would; only connections opened afterwards work again.
    pub fn set_available(&self, available: bool) {
        let was_available = self.shared.available.swap(available, Ordering::SeqCst);
        if was_available && !available {
            self.shared.outages.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    /// Refuses the next `count` connect attempts regardless of availability.
    pub fn refuse_next_connects(&self, count: u32) {
        self.shared.refuse_connects.store(count, Ordering::SeqCst);
    }

    /// Number of connect attempts made against this store.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    // == Length ==
    /// Returns the number of stored entries, including not yet purged expired ones.
    pub fn len(&self) -> usize {
        lock(&self.shared.entries).len()
    }

    // == Is Empty ==
    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        lock(&self.shared.entries).is_empty()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = lock(&self.shared.entries);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Memory store cleanup removed {} expired entries", removed);
        }
        removed
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn StoreConnection>, StoreError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .shared
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused || !self.is_available() {
            return Err(StoreError::Unavailable(format!(
                "connection refused by {}:{}",
                params.host, params.port
            )));
        }

        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            opened_after: self.shared.outages.load(Ordering::SeqCst),
        }))
    }
}

// == Memory Connection ==
struct MemoryConnection {
    shared: Arc<Shared>,
    /// Outage count when the connection was opened
    opened_after: u32,
}

impl MemoryConnection {
    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, StoreEntry>>, StoreError> {
        if self.shared.outages.load(Ordering::SeqCst) != self.opened_after {
            return Err(StoreError::Unavailable("connection dropped".to_string()));
        }
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        Ok(lock(&self.shared.entries))
    }
}

/// Fetches a live entry, dropping it first if it has expired.
fn live<'a>(entries: &'a mut HashMap<String, StoreEntry>, key: &str) -> Option<&'a StoreEntry> {
    if entries.get(key).is_some_and(StoreEntry::is_expired) {
        entries.remove(key);
    }
    entries.get(key)
}

impl StoreConnection for MemoryConnection {
    fn ping(&mut self) -> Result<(), StoreError> {
        self.entries().map(|_| ())
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries()?;
        Ok(live(&mut entries, key).map(|entry| entry.value.clone()))
    }

    fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let mut entries = self.entries()?;
        Ok(keys
            .iter()
            .map(|key| live(&mut entries, key).map(|entry| entry.value.clone()))
            .collect())
    }

    fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        entries.insert(key.to_string(), StoreEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, StoreError> {
        let mut entries = self.entries()?;
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if !entry.is_expired() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries()?;
        let now = Utc::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired_at(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn pttl(&mut self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries()?;
        Ok(live(&mut entries, key).map_or(PTTL_MISSING, StoreEntry::pttl))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
