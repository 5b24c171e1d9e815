//! Fetch Module
//!
//! The network collaborator: fetch the bytes behind a key, or fail.

mod http;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use http::HttpFetcher;

/// Fetches raw image bytes for a key (a URL).
///
/// Implementations enforce their own timeouts; any failure, timeouts
/// included, is reported as [`CacheError::Fetch`].
///
/// [`CacheError::Fetch`]: crate::error::CacheError::Fetch
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_bytes(&self, key: &str) -> Result<Bytes>;
}
