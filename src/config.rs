//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{PathPolicy, DEFAULT_SWEEP_BATCH_SIZE};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// TTL in seconds for key/value entries set without one (0 = never expire)
    pub default_ttl: u64,
    /// Directory served under `/files`, if any
    pub file_root: Option<PathBuf>,
    /// TTL in seconds for cached files (0 = never expire)
    pub file_ttl: u64,
    /// Load the whole `file_root` tree into the cache at startup
    pub preload_files: bool,
    /// Background sweep interval in milliseconds (0 = no background sweep)
    pub sweep_interval_ms: u64,
    /// Longest a sweep waits for the table lock before skipping a cycle
    pub sweep_lock_timeout_ms: u64,
    /// Keys removed per lock acquisition during a sweep
    pub sweep_batch_size: usize,
    /// Keep `..` components that climb above a relative path's root
    pub allow_parent_escape: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DEFAULT_TTL` - Default key/value TTL in seconds (default: 300)
    /// - `FILE_ROOT` - Directory to serve under `/files` (default: unset)
    /// - `FILE_TTL` - File cache TTL in seconds (default: 60)
    /// - `PRELOAD_FILES` - Load `FILE_ROOT` at startup (default: false)
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency (default: 1000)
    /// - `SWEEP_LOCK_TIMEOUT_MS` - Sweep lock wait bound (default: 10)
    /// - `SWEEP_BATCH_SIZE` - Keys removed per lock hold (default: 256)
    /// - `ALLOW_PARENT_ESCAPE` - Accept escaping `..` in paths (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            default_ttl: parse_env("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            file_root: env::var("FILE_ROOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            file_ttl: parse_env("FILE_TTL").unwrap_or(defaults.file_ttl),
            preload_files: parse_env("PRELOAD_FILES").unwrap_or(defaults.preload_files),
            sweep_interval_ms: parse_env("SWEEP_INTERVAL_MS").unwrap_or(defaults.sweep_interval_ms),
            sweep_lock_timeout_ms: parse_env("SWEEP_LOCK_TIMEOUT_MS")
                .unwrap_or(defaults.sweep_lock_timeout_ms),
            sweep_batch_size: parse_env("SWEEP_BATCH_SIZE").unwrap_or(defaults.sweep_batch_size),
            allow_parent_escape: parse_env("ALLOW_PARENT_ESCAPE")
                .unwrap_or(defaults.allow_parent_escape),
        }
    }

    /// TTL applied to key/value entries set without one.
    pub fn default_kv_ttl(&self) -> Option<Duration> {
        seconds_or_never(self.default_ttl)
    }

    /// TTL applied to cached files.
    pub fn file_cache_ttl(&self) -> Option<Duration> {
        seconds_or_never(self.file_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn sweep_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.sweep_lock_timeout_ms)
    }

    pub fn path_policy(&self) -> PathPolicy {
        PathPolicy {
            allow_parent_escape: self.allow_parent_escape,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            default_ttl: 300,
            file_root: None,
            file_ttl: 60,
            preload_files: false,
            sweep_interval_ms: 1000,
            sweep_lock_timeout_ms: 10,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            allow_parent_escape: false,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn seconds_or_never(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
