//! Cache Module
//!
//! Provides in-memory caching with TTL expiration: a generic key/value
//! [`MemCache`] and a path-keyed [`FileCache`] built on top of it.

mod clock;
mod entry;
mod file;
pub mod loader;
mod mem;
mod path;
mod stats;


// Re-export public types
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use entry::CacheEntry;
pub use file::FileCache;
pub use mem::{Lookup, MemCache};
pub use path::{normalize, normalize_str, NormalizedPath, PathPolicy};
pub use stats::CacheStats;

// == Public Constants ==
/// Keys removed per write-lock acquisition during a purge
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 256;

/// Maximum allowed key length in bytes for the key/value API
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes for the key/value API
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
