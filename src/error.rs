//! Error types for the cache library and server
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Path Error Enum ==
/// Reasons a path cannot be turned into a cache key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),

    /// `..` would climb above the first component
    #[error("path escapes its root: {0}")]
    EscapesRoot(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache library and server.
///
/// A lookup miss is not an error inside the library; only the HTTP layer
/// turns it into `NotFound`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Path normalization failed
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The table lock could not be taken in time; retry later
    #[error("Lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// Reading content for the file cache failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures a caller may simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::LockTimeout(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            CacheError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            CacheError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;
