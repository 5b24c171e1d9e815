//! HTTP GET fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::Fetcher;
use crate::error::{CacheError, Result};

/// Fetches keys as URLs with connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| CacheError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_bytes(&self, key: &str) -> Result<Bytes> {
        let fetch_error = |reason: String| CacheError::Fetch {
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .get(key)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_error(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        debug!(key, len = bytes.len(), "fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_fetch_error() {
        let fetcher =
            HttpFetcher::new(Duration::from_millis(200), Duration::from_millis(200)).unwrap();

        let result = fetcher.fetch_bytes("not a url").await;
        assert!(matches!(result, Err(CacheError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher =
            HttpFetcher::new(Duration::from_millis(200), Duration::from_millis(200)).unwrap();

        // Port 9 on localhost: nothing listens there
        let result = fetcher.fetch_bytes("http://127.0.0.1:9/img.png").await;
        assert!(matches!(result, Err(CacheError::Fetch { .. })));
    }
}
