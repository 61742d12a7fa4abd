//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tracing::debug;

use crate::cache::{FileCache, MemCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::responses::duration_ms;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, PurgeResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// Both caches lock internally, so handlers only need shared references.
#[derive(Clone)]
pub struct AppState {
    /// Key/value cache
    pub kv: Arc<MemCache<String, String>>,
    /// File content cache
    pub files: Arc<FileCache>,
    /// TTL for key/value entries set without one
    pub default_ttl: Option<Duration>,
    /// Directory backing `/files` misses
    pub file_root: Option<PathBuf>,
    /// TTL for files loaded on a miss
    pub file_ttl: Option<Duration>,
}

impl AppState {
    /// Creates a new AppState around the given caches.
    pub fn new(kv: MemCache<String, String>, files: FileCache) -> Self {
        Self {
            kv: Arc::new(kv),
            files: Arc::new(files),
            default_ttl: Config::default().default_kv_ttl(),
            file_root: None,
            file_ttl: Config::default().file_cache_ttl(),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        let kv = MemCache::new().with_batch_size(config.sweep_batch_size);
        let files = FileCache::with_policy(config.path_policy()).with_batch_size(config.sweep_batch_size);
        Self {
            default_ttl: config.default_kv_ttl(),
            file_root: config.file_root.clone(),
            file_ttl: config.file_cache_ttl(),
            ..Self::new(kv, files)
        }
    }

    /// Serves `/files` misses from `root`, caching them for `ttl`.
    pub fn with_file_root(mut self, root: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        self.file_root = Some(root.into());
        self.file_ttl = ttl;
        self
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.effective_ttl(state.default_ttl);
    state.kv.insert(req.key.clone(), req.value, ttl);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a live value and its remaining TTL.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let hit = state
        .kv
        .find_with_ttl(key.as_str())
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, hit.value, hit.remaining)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.kv.remove(key.as_str()) {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /purge
///
/// Sweeps both caches immediately.
pub async fn purge_handler(State(state): State<AppState>) -> Json<PurgeResponse> {
    Json(PurgeResponse {
        kv_removed: state.kv.purge_expired(),
        files_removed: state.files.purge_expired(),
    })
}

/// Handler for GET /files/*path
///
/// Serves cached content. On a miss with a configured file root, the file is
/// read from disk before touching the cache, then inserted and served.
pub async fn file_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    if let Some(hit) = state.files.find_path_with_ttl(&path)? {
        return Ok(file_response(hit.value, "hit", hit.remaining));
    }

    let root = state
        .file_root
        .as_ref()
        .ok_or_else(|| CacheError::NotFound(path.clone()))?;

    // Disk reads stay inside the root whatever the key policy allows.
    let key = state.files.key_for(&path)?;
    let escapes = key.as_str() == ".." || key.as_str().starts_with("../");
    if key.is_absolute() || key.as_str() == "." || escapes {
        return Err(CacheError::InvalidRequest(format!(
            "Path '{}' is outside the file root",
            path
        )));
    }

    let disk_path = root.join(key.as_str());
    let content = Bytes::from(
        tokio::fs::read(&disk_path)
            .await
            .map_err(|e| CacheError::io(&disk_path, e))?,
    );
    debug!(key = %key, bytes = content.len(), "loaded file into cache");

    state.files.insert_key(key, content.clone(), state.file_ttl);
    Ok(file_response(content, "miss", state.file_ttl))
}

/// Handler for DELETE /files/*path
pub async fn file_delete_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.files.remove_path(&path)? {
        Ok(Json(DeleteResponse::new(path)))
    } else {
        Err(CacheError::NotFound(path))
    }
}

fn file_response(content: Bytes, cache_status: &'static str, remaining: Option<Duration>) -> Response {
    let mut response = (StatusCode::OK, content).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert("x-cache", HeaderValue::from_static(cache_status));
    if let Some(remaining) = remaining {
        headers.insert("x-cache-ttl-ms", HeaderValue::from(duration_ms(remaining)));
    }
    response
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        kv: state.kv.stats().into(),
        files: state.files.stats().into(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
