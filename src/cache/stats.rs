//! Cache Statistics Module
//!
//! Tracks how memoized calls were served.

use serde::Serialize;

// == Cache Stats ==
/// Counters for one memoizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the store
    pub hits: u64,
    /// Calls that found no usable entry and ran the computation, whether
    /// or not it succeeded and its result was stored
    pub misses: u64,
    /// Calls computed directly because the store was unhealthy
    pub bypasses: u64,
    /// Lookups whose fault was swallowed and treated as a miss
    pub fetch_errors: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if nothing went through the cache.
    /// Bypassed calls are not counted.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total calls seen.
    pub fn calls(&self) -> u64 {
        self.hits + self.misses + self.bypasses
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_bypass(&mut self) {
        self.bypasses += 1;
    }

    pub fn record_fetch_error(&mut self) {
        self.fetch_errors += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.bypasses, 0);
        assert_eq!(stats.fetch_errors, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_bypass();
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.calls(), 3);
    }

    #[test]
    fn test_serializes_counters() {
        let mut stats = CacheStats::new();
        stats.record_fetch_error();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["fetch_errors"], 1);
        assert_eq!(json["hits"], 0);
    }
}
