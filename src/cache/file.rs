//! File Cache Module
//!
//! Caches file content in memory, keyed by normalized path.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::clock::{Clock, MonotonicClock};
use crate::cache::mem::{Lookup, MemCache};
use crate::cache::path::{normalize, NormalizedPath, PathPolicy};
use crate::cache::stats::CacheStats;
use crate::error::Result;

// == File Cache ==
/// Path-keyed cache of file content.
///
/// Every path is normalized with the cache's [`PathPolicy`] before it touches
/// the table, so `a/./b` and `a//b` share the entry stored for `a/b`. The
/// cache never reads the filesystem; callers load content and insert it.
#[derive(Debug)]
pub struct FileCache<C = MonotonicClock> {
    inner: MemCache<NormalizedPath, Bytes, C>,
    policy: RwLock<PathPolicy>,
}

impl FileCache<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new(), PathPolicy::default())
    }

    pub fn with_policy(policy: PathPolicy) -> Self {
        Self::with_clock(MonotonicClock::new(), policy)
    }
}

impl Default for FileCache<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> FileCache<C> {
    pub fn with_clock(clock: C, policy: PathPolicy) -> Self {
        Self {
            inner: MemCache::with_clock(clock),
            policy: RwLock::new(policy),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.inner = self.inner.with_batch_size(batch_size);
        self
    }

    pub fn policy(&self) -> PathPolicy {
        *self.policy.read()
    }

    /// Normalizes `path` under this cache's policy.
    pub fn key_for(&self, path: impl AsRef<Path>) -> Result<NormalizedPath> {
        Ok(normalize(path, &self.policy())?)
    }

    // == Insert ==
    /// Stores `content` for `path`. A path that fails normalization leaves
    /// the table untouched.
    pub fn insert(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Bytes>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = self.key_for(path)?;
        self.insert_key(key, content, ttl);
        Ok(())
    }

    /// Stores `content` under an already normalized key.
    pub fn insert_key(&self, key: NormalizedPath, content: impl Into<Bytes>, ttl: Option<Duration>) {
        self.inner.insert(key, content.into(), ttl);
    }

    // == Find ==
    /// Looks up a key given in normalized string form. No normalization is
    /// applied; use [`FileCache::find_path`] for raw paths.
    pub fn find(&self, key: &str) -> Option<Bytes> {
        self.inner.find(key)
    }

    pub fn find_with_ttl(&self, key: &str) -> Option<Lookup<Bytes>> {
        self.inner.find_with_ttl(key)
    }

    /// Normalizes `path`, then looks it up.
    pub fn find_path(&self, path: impl AsRef<Path>) -> Result<Option<Bytes>> {
        let key = self.key_for(path)?;
        Ok(self.inner.find(&key))
    }

    pub fn find_path_with_ttl(&self, path: impl AsRef<Path>) -> Result<Option<Lookup<Bytes>>> {
        let key = self.key_for(path)?;
        Ok(self.inner.find_with_ttl(&key))
    }

    pub fn contains_path(&self, path: impl AsRef<Path>) -> Result<bool> {
        let key = self.key_for(path)?;
        Ok(self.inner.contains(&key))
    }

    // == Remove ==
    pub fn remove(&self, key: &str) -> bool {
        self.inner.remove(key)
    }

    pub fn remove_path(&self, path: impl AsRef<Path>) -> Result<bool> {
        let key = self.key_for(path)?;
        Ok(self.inner.remove(&key))
    }

    /// Removes every entry at or below the directory `path`. Returns how many
    /// of them were live.
    pub fn remove_prefix(&self, path: impl AsRef<Path>) -> Result<usize> {
        let dir = self.key_for(path)?;
        let removed = self.inner.remove_where(|key| key.starts_with(&dir));
        debug!(prefix = %dir, removed, "removed cached files under prefix");
        Ok(removed)
    }

    // == Maintenance ==
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    pub fn try_purge_expired(&self, lock_timeout: Duration) -> Result<usize> {
        self.inner.try_purge_expired(lock_timeout)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Exchanges contents and path policies, so every key stays reachable
    /// under the policy it was normalized with.
    pub fn swap(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        let (mut ours, mut theirs) = if (self as *const Self) < (other as *const Self) {
            let ours = self.policy.write();
            (ours, other.policy.write())
        } else {
            let theirs = other.policy.write();
            (self.policy.write(), theirs)
        };
        self.inner.swap(&other.inner);
        std::mem::swap(&mut *ours, &mut *theirs);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
