//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use crate::cache::clock::Timestamp;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Time the entry was written
    pub inserted_at: Timestamp,
    /// Absolute expiration time, None = no expiration
    pub expires_at: Option<Timestamp>,
    /// Insertion sequence number within the owning cache
    pub seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// The TTL is converted to an absolute expiration immediately, so nothing
    /// downstream ever recomputes it from a stored duration.
    pub fn new(value: V, now: Timestamp, ttl: Option<Duration>, seq: u64) -> Self {
        Self {
            value,
            inserted_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            seq,
        }
    }

    // == Is Live ==
    /// Checks whether the entry may be returned as a hit at `now`.
    ///
    /// Liveness is the half-open interval `[inserted_at, expires_at)`: an entry
    /// whose expiration equals `now` is already dead.
    pub fn is_live(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }

    // == Is Expired ==
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.is_live(now)
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now))
    }

    // == Rebase ==
    /// Moves the entry from a clock reading `from` to another clock reading
    /// `to`, preserving its age and remaining lifetime.
    pub fn rebase(&mut self, from: Timestamp, to: Timestamp) {
        let age = from.saturating_duration_since(self.inserted_at);
        let age = u64::try_from(age.as_nanos()).unwrap_or(u64::MAX);
        self.inserted_at = Timestamp::from_nanos(to.as_nanos().saturating_sub(age));
        self.expires_at = self.expires_at.map(|expires| to + expires.saturating_duration_since(from));
    }
}
