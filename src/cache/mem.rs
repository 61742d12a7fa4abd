//! Memory Cache Module
//!
//! Generic, thread-safe key/value cache with per-entry expiration.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, trace};

use crate::cache::clock::{Clock, MonotonicClock, Timestamp};
use crate::cache::entry::CacheEntry;
use crate::cache::stats::{CacheStats, StatsCounters};
use crate::cache::DEFAULT_SWEEP_BATCH_SIZE;
use crate::error::{CacheError, Result};

// == Lookup ==
/// A live hit together with its remaining time-to-live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V> {
    pub value: V,
    /// `None` when the entry never expires
    pub remaining: Option<Duration>,
}

/// Position of an expiring entry in the expiry index.
type ExpirySlot = (Timestamp, u64);

// == Table ==
/// Entries plus an index of the ones that expire, ordered by deadline.
///
/// Every entry with `expires_at = Some(t)` has exactly one slot `(t, seq)`
/// in `expiry`, and every slot points back at such an entry.
struct Table<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    expiry: BTreeMap<ExpirySlot, K>,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            expiry: BTreeMap::new(),
        }
    }

    fn insert(&mut self, key: K, entry: CacheEntry<V>) {
        if let Some(expires) = entry.expires_at {
            self.expiry.insert((expires, entry.seq), key.clone());
        }
        if let Some(old) = self.map.insert(key, entry) {
            self.unindex(&old);
        }
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let old = self.map.remove(key)?;
        self.unindex(&old);
        Some(old)
    }

    fn unindex(&mut self, entry: &CacheEntry<V>) {
        if let Some(expires) = entry.expires_at {
            self.expiry.remove(&(expires, entry.seq));
        }
    }

    fn reindex(&mut self) {
        self.expiry = self
            .map
            .iter()
            .filter_map(|(key, entry)| {
                entry
                    .expires_at
                    .map(|expires| ((expires, entry.seq), key.clone()))
            })
            .collect();
    }

    fn clear(&mut self) {
        self.map.clear();
        self.expiry.clear();
    }
}

/// What one purge pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PurgeReport {
    /// Entries removed
    removed: usize,
    /// Expiry slots examined
    scanned: usize,
    /// Write-lock acquisitions
    batches: usize,
}

// == Mem Cache ==
/// In-memory cache mapping `K` to `V` with optional expiration per entry.
///
/// All operations take `&self`; the table sits behind a reader-writer lock
/// with lookups on the read side. Expired entries are never returned, but
/// they stay in the table until [`MemCache::purge_expired`] runs.
pub struct MemCache<K, V, C = MonotonicClock> {
    table: RwLock<Table<K, V>>,
    clock: C,
    next_seq: AtomicU64,
    batch_size: usize,
    stats: StatsCounters,
}

impl<K, V> MemCache<K, V, MonotonicClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache on the process monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl<K, V> Default for MemCache<K, V, MonotonicClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> MemCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    // == Constructor ==
    pub fn with_clock(clock: C) -> Self {
        Self {
            table: RwLock::new(Table::new()),
            clock,
            next_seq: AtomicU64::new(0),
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            stats: StatsCounters::default(),
        }
    }

    /// Sets how many entries a sweep removes per write-lock acquisition.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // == Insert ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl = None` never expires; `Some(Duration::ZERO)` is dead on arrival.
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let mut table = self.table.write();
        let now = self.clock.now();
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        table.insert(key, CacheEntry::new(value, now, ttl, seq));
        trace!(?ttl, seq, "cache insert");
    }

    // == Find ==
    /// Returns a copy of the value if `key` holds a live entry.
    pub fn find<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_with_ttl(key).map(|hit| hit.value)
    }

    /// Like [`MemCache::find`], also reporting the remaining time-to-live.
    pub fn find_with_ttl<Q>(&self, key: &Q) -> Option<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.table.read();
        let now = self.clock.now();

        match table.map.get(key) {
            Some(entry) if entry.is_live(now) => {
                self.stats.record_hit();
                Some(Lookup {
                    value: entry.value.clone(),
                    remaining: entry.remaining(now),
                })
            }
            Some(_) => {
                self.stats.record_expired();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Live presence check that does not copy the value or touch stats.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.table.read();
        let now = self.clock.now();
        table.map.get(key).is_some_and(|entry| entry.is_live(now))
    }

    // == Remove ==
    /// Deletes the entry for `key`. Returns whether a live entry was removed;
    /// an expired leftover is dropped too but reported as absent.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut table = self.table.write();
        let now = self.clock.now();
        table.remove(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Removes every entry present at the start of the call whose key matches
    /// `predicate`. Returns how many of them were live.
    ///
    /// Matches are gathered under the read lock, then removed in batches,
    /// taking the write lock once per batch. An entry re-inserted after the
    /// scan began is left alone.
    pub fn remove_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let matches: Vec<(K, u64)> = self
            .table
            .read()
            .map
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, entry)| (key.clone(), entry.seq))
            .collect();

        let mut removed = 0;
        for batch in matches.chunks(self.batch_size) {
            let mut table = self.table.write();
            let now = self.clock.now();
            for (key, seq) in batch {
                // A re-insert gets a fresh sequence number
                let current = table.map.get(key).is_some_and(|entry| entry.seq == *seq);
                if current && table.remove(key).is_some_and(|entry| entry.is_live(now)) {
                    removed += 1;
                }
            }
            RwLockWriteGuard::unlock_fair(table);
        }
        removed
    }

    // == Clear ==
    pub fn clear(&self) {
        self.table.write().clear();
        debug!("cache cleared");
    }

    // == Purge ==
    /// Removes every entry that is dead at the start of the call.
    ///
    /// Only the expired front of the expiry index is visited, so the cost
    /// depends on how many entries are dead, not on the table size. Removal
    /// happens in batches of the configured size; the write lock is released
    /// between batches, and entries inserted after the call began survive.
    pub fn purge_expired(&self) -> usize {
        // Untimed lock acquisition never fails.
        self.purge_inner(None)
            .map(|report| report.removed)
            .unwrap_or_default()
    }

    /// Like [`MemCache::purge_expired`], but gives up with
    /// [`CacheError::LockTimeout`] if any lock is not acquired within
    /// `lock_timeout`. Batches removed before the timeout stay removed.
    pub fn try_purge_expired(&self, lock_timeout: Duration) -> Result<usize> {
        self.purge_inner(Some(lock_timeout))
            .map(|report| report.removed)
    }

    fn purge_inner(&self, lock_timeout: Option<Duration>) -> Result<PurgeReport> {
        let now = self.clock.now();
        let start_seq = self.next_seq.load(Ordering::Acquire);
        let due_until = Bound::Included((now, u64::MAX));
        let mut cursor = Bound::Unbounded;
        let mut report = PurgeReport::default();

        loop {
            let mut table = match self.write_guard(lock_timeout) {
                Ok(guard) => guard,
                Err(err) => {
                    self.stats.record_purged(report.removed);
                    return Err(err);
                }
            };
            report.batches += 1;

            let due: Vec<ExpirySlot> = table
                .expiry
                .range((cursor, due_until))
                .take(self.batch_size)
                .map(|(slot, _)| *slot)
                .collect();
            for slot in &due {
                report.scanned += 1;
                // Inserted after the purge began
                if slot.1 >= start_seq {
                    continue;
                }
                if let Some(key) = table.expiry.remove(slot) {
                    table.map.remove(&key);
                    report.removed += 1;
                }
            }
            RwLockWriteGuard::unlock_fair(table);

            match due.last() {
                Some(last) if due.len() == self.batch_size => cursor = Bound::Excluded(*last),
                _ => break,
            }
        }

        self.stats.record_purged(report.removed);
        if report.removed > 0 {
            debug!(
                removed = report.removed,
                scanned = report.scanned,
                batches = report.batches,
                "purged expired entries"
            );
        }
        Ok(report)
    }

    fn write_guard(&self, lock_timeout: Option<Duration>) -> Result<RwLockWriteGuard<'_, Table<K, V>>> {
        match lock_timeout {
            None => Ok(self.table.write()),
            Some(timeout) => self
                .table
                .try_write_for(timeout)
                .ok_or(CacheError::LockTimeout(timeout)),
        }
    }

    // == Length ==
    /// Number of entries physically held, including dead ones not yet purged.
    pub fn len(&self) -> usize {
        self.table.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().map.is_empty()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    // == Swap ==
    /// Exchanges the contents of two caches.
    ///
    /// Expirations are rebased onto the receiving cache's clock so remaining
    /// lifetimes carry over unchanged.
    pub fn swap(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        // Lock in address order so two opposite swaps cannot deadlock.
        let (mut ours, mut theirs) = if (self as *const Self) < (other as *const Self) {
            let ours = self.table.write();
            (ours, other.table.write())
        } else {
            let theirs = other.table.write();
            (self.table.write(), theirs)
        };

        let our_now = self.clock.now();
        let their_now = other.clock.now();
        std::mem::swap(&mut *ours, &mut *theirs);

        for entry in ours.map.values_mut() {
            entry.rebase(their_now, our_now);
        }
        for entry in theirs.map.values_mut() {
            entry.rebase(our_now, their_now);
        }
        ours.reindex();
        theirs.reindex();

        // Keep every moved entry below both counters so purges still see it.
        let high = self
            .next_seq
            .load(Ordering::Acquire)
            .max(other.next_seq.load(Ordering::Acquire));
        self.next_seq.store(high, Ordering::Release);
        other.next_seq.store(high, Ordering::Release);
    }
}

impl<K, V, C> fmt::Debug for MemCache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        f.debug_struct("MemCache")
            .field("entries", &table.map.len())
            .field("expiring", &table.expiry.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
