//! Cache Statistics Module
//!
//! Tracks cache lookup outcomes and sweep activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of lookups that returned a live value
    pub hits: u64,
    /// Number of lookups that found nothing (including expired entries)
    pub misses: u64,
    /// Subset of misses where a dead entry was still in the table
    pub expired: u64,
    /// Number of entries removed by sweeps
    pub purged: u64,
    /// Current number of physical entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters updated from behind a read lock.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    purged: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self, count: usize) {
        self.purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
