//! Directory Loader
//!
//! Fills a [`FileCache`] from a directory tree. This runs on the caller's
//! thread and does blocking reads; every file is read completely before its
//! insert, so no disk I/O happens while the cache lock is held.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cache::clock::Clock;
use crate::cache::file::FileCache;
use crate::cache::path::normalize_str;
use crate::error::{CacheError, PathError, Result};

/// Decides what to store for one file. Returning `Ok(false)` skips it.
pub type InsertHandler<'a, C> =
    dyn FnMut(&FileCache<C>, &str, Bytes, Option<Duration>) -> Result<bool> + 'a;

/// Caches every regular file below `root` under `prefix`.
///
/// A file at `root/css/site.css` with prefix `/static` lands at
/// `/static/css/site.css`. Returns the number of files inserted.
pub fn insert_dir<C: Clock>(
    cache: &FileCache<C>,
    root: impl AsRef<Path>,
    prefix: &str,
    ttl: Option<Duration>,
) -> Result<usize> {
    insert_dir_with(cache, root, prefix, ttl, &mut |cache, key, content, ttl| {
        cache.insert(key, content, ttl)?;
        Ok(true)
    })
}

/// Like [`insert_dir`], routing every file through `handler`.
///
/// Symlinks are not followed. Files are visited in file-name order.
pub fn insert_dir_with<C: Clock>(
    cache: &FileCache<C>,
    root: impl AsRef<Path>,
    prefix: &str,
    ttl: Option<Duration>,
    handler: &mut InsertHandler<'_, C>,
) -> Result<usize> {
    let root = root.as_ref();
    let policy = cache.policy();
    let prefix = normalize_str(prefix, &policy)?;
    let mut inserted = 0;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if !file_type.is_file() {
            debug!(path = %path.display(), "skipping non-regular file");
            continue;
        }

        let relative = path.strip_prefix(root).map_err(|_| {
            CacheError::Internal(format!("{} is outside {}", path.display(), root.display()))
        })?;
        let relative = relative
            .to_str()
            .ok_or_else(|| PathError::NonUtf8(relative.display().to_string()))?;
        let key = prefix.join(relative, &policy)?;

        let content = fs::read(path).map_err(|e| CacheError::io(path, e))?;
        if handler(cache, key.as_str(), Bytes::from(content), ttl)? {
            inserted += 1;
        }
    }

    info!(root = %root.display(), %prefix, inserted, "loaded directory into file cache");
    Ok(inserted)
}

fn walk_error(root: &Path, err: walkdir::Error) -> CacheError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    CacheError::io(path, source)
}
