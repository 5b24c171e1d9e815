//! Error types for the image cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the caches and the load pipeline.
///
/// Fetch, decode and file-write failures are recoverable: the pipeline turns
/// them into a placeholder image plus a notification. Everything else signals
/// a bug or a broken environment.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Store used before a budget was configured, or with a zero budget
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Empty key passed to an add operation
    #[error("Invalid key: keys must be non-empty")]
    InvalidKey,

    /// A single entry costs more than the whole budget
    #[error("Entry {key} costs {size} bytes, more than the budget of {max} bytes")]
    EntryTooLarge { key: String, size: u64, max: u64 },

    /// Disk bookkeeping disagrees with the filesystem
    #[error("Cache consistency violated at {}: {reason}", path.display())]
    Consistency { path: PathBuf, reason: String },

    /// Network fetch failed (including timeouts)
    #[error("Fetch failed for {key}: {reason}")]
    Fetch { key: String, reason: String },

    /// Bytes could not be decoded into an image
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Writing a cache file failed
    #[error("Failed to write {}: {reason}", path.display())]
    FileWrite { path: PathBuf, reason: String },

    /// Filesystem error outside of a cache write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for failures that degrade to a placeholder instead of
    /// aborting the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CacheError::Fetch { .. } | CacheError::Decode(_) | CacheError::FileWrite { .. }
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::Fetch { .. } | CacheError::Decode(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the image cache.
pub type Result<T> = std::result::Result<T, CacheError>;
