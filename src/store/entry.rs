//! Store Entry Module
//!
//! A single value held by the in-process backend, with optional expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Ttl, PTTL_NO_EXPIRY};

// == Store Entry ==
/// Represents a single stored value with expiry metadata.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiration time, None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The bytes to store
    /// * `ttl` - Optional time-to-live
    pub fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        // A TTL too large to represent behaves as no expiry
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == PTTL ==
    /// Remaining lifetime in the store's `PTTL` convention.
    ///
    /// # Returns
    /// - `-1` if the entry never expires
    /// - remaining milliseconds otherwise (0 once elapsed)
    pub fn pttl(&self) -> i64 {
        match self.expires_at {
            Some(expires) => (expires - Utc::now()).num_milliseconds().max(0),
            None => PTTL_NO_EXPIRY,
        }
    }

    /// Remaining lifetime as a [`Ttl`].
    pub fn ttl(&self) -> Ttl {
        Ttl::from_pttl(self.pttl())
    }
}
