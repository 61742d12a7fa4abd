//! Tidecache - expiring in-memory caches
//!
//! A generic key/value [`MemCache`](cache::MemCache) and a path-keyed
//! [`FileCache`](cache::FileCache), both with per-entry TTLs, lazy expiry on
//! lookup and background sweeps, plus a small HTTP server exposing them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{FileCache, MemCache};
pub use config::Config;
pub use error::{CacheError, PathError, Result};
pub use tasks::{spawn_sweep_task, SweepConfig, SweepHandle, SweepTarget};
