//! Exponential backoff between reconnect attempts.

use std::time::Duration;

/// Growth factor of the reconnect schedule
pub const BACKOFF_BASE: u64 = 3;

// == Backoff Policy ==
/// `min(base^attempt, max_sleep)` seconds, attempts counted from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: u64,
    pub max_sleep: Duration,
}

impl BackoffPolicy {
    pub fn new(max_sleep: Duration) -> Self {
        Self {
            base: BACKOFF_BASE,
            max_sleep,
        }
    }

    // == Delay ==
    /// Sleep before the attempt after `attempt`, capped at `max_sleep`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.base.checked_pow(attempt) {
            Some(secs) => Duration::from_secs(secs).min(self.max_sleep),
            None => self.max_sleep,
        }
    }

    /// The first `attempts` delays of the schedule.
    pub fn schedule(&self, attempts: u32) -> Vec<Duration> {
        (0..attempts).map(|attempt| self.delay(attempt)).collect()
    }
}
