//! Response DTOs for the image cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Statistics for one cache tier
#[derive(Debug, Clone, Serialize)]
pub struct TierStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_entries: usize,
    pub current_size: u64,
    pub max_size: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for TierStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            current_size: stats.current_size,
            max_size: stats.max_size,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
///
/// A tier that is disabled serializes as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub memory: Option<TierStatsResponse>,
    pub disk: Option<TierStatsResponse>,
}

/// Response body for PUT /settings
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub message: String,
    /// Number of changes queued for the reconfiguration task
    pub queued: usize,
}

impl SettingsResponse {
    pub fn new(queued: usize) -> Self {
        Self {
            message: format!("{} settings change(s) queued", queued),
            queued,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
