//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DiskCacheConfig, MemoryBudget};

const MIB: u64 = 1024 * 1024;

/// How the memory cache budget is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetMode {
    Bytes,
    Percent,
}

impl FromStr for BudgetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bytes" => Ok(BudgetMode::Bytes),
            "percent" => Ok(BudgetMode::Percent),
            other => Err(format!("unknown budget mode '{}'", other)),
        }
    }
}

/// Application configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the memory tier is used
    pub memory_cache_enabled: bool,
    /// Byte or percent budget
    pub memory_budget_mode: BudgetMode,
    /// Memory budget in bytes (bytes mode)
    pub memory_cache_bytes: u64,
    /// Memory budget as a percentage of `runtime_max_memory` (percent mode)
    pub memory_cache_percent: u8,
    /// Memory the percent budget is taken of
    pub runtime_max_memory: u64,
    /// Whether the disk tier is used
    pub disk_cache_enabled: bool,
    /// Disk budget in bytes
    pub disk_cache_bytes: u64,
    /// Wipe the disk cache directory at startup
    pub disk_cache_clear_on_startup: bool,
    /// Cache subdirectory name
    pub disk_cache_subdir: String,
    /// App-private storage root
    pub cache_dir_internal: PathBuf,
    /// Removable storage root, used when it exists
    pub cache_dir_external: Option<PathBuf>,
    pub prefer_external_storage: bool,
    /// Verbose logging for the memory tier
    pub trace_memory_cache: bool,
    /// Verbose logging for the disk tier
    pub trace_disk_cache: bool,
    /// Verbose logging for the load pipeline
    pub trace_loader: bool,
    pub fetch_connect_timeout_ms: u64,
    pub fetch_read_timeout_ms: u64,
    /// Decoder bounding box
    pub image_max_width: u32,
    pub image_max_height: u32,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset or unparseable variables fall back to the [`Default`] values.
    ///
    /// # Environment Variables
    /// - `MEMORY_CACHE_ENABLED` (default: true)
    /// - `MEMORY_CACHE_MODE` - `bytes` or `percent` (default: percent)
    /// - `MEMORY_CACHE_BYTES` (default: 16 MiB)
    /// - `MEMORY_CACHE_PERCENT` (default: 10)
    /// - `RUNTIME_MAX_MEMORY` (default: 256 MiB)
    /// - `DISK_CACHE_ENABLED` (default: true)
    /// - `DISK_CACHE_BYTES` (default: 64 MiB)
    /// - `DISK_CACHE_CLEAR_ON_STARTUP` (default: false)
    /// - `DISK_CACHE_SUBDIR` (default: images)
    /// - `CACHE_DIR_INTERNAL` (default: `<tmp>/image_tier_cache`)
    /// - `CACHE_DIR_EXTERNAL` (default: unset)
    /// - `PREFER_EXTERNAL_STORAGE` (default: true)
    /// - `TRACE_MEMORY_CACHE`, `TRACE_DISK_CACHE`, `TRACE_LOADER` (default: false)
    /// - `FETCH_CONNECT_TIMEOUT_MS` (default: 5000), `FETCH_READ_TIMEOUT_MS` (default: 10000)
    /// - `IMAGE_MAX_WIDTH`, `IMAGE_MAX_HEIGHT` (default: 512)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_cache_enabled: env_or("MEMORY_CACHE_ENABLED", defaults.memory_cache_enabled),
            memory_budget_mode: env_or("MEMORY_CACHE_MODE", defaults.memory_budget_mode),
            memory_cache_bytes: env_or("MEMORY_CACHE_BYTES", defaults.memory_cache_bytes),
            memory_cache_percent: env_or("MEMORY_CACHE_PERCENT", defaults.memory_cache_percent),
            runtime_max_memory: env_or("RUNTIME_MAX_MEMORY", defaults.runtime_max_memory),
            disk_cache_enabled: env_or("DISK_CACHE_ENABLED", defaults.disk_cache_enabled),
            disk_cache_bytes: env_or("DISK_CACHE_BYTES", defaults.disk_cache_bytes),
            disk_cache_clear_on_startup: env_or(
                "DISK_CACHE_CLEAR_ON_STARTUP",
                defaults.disk_cache_clear_on_startup,
            ),
            disk_cache_subdir: env_or("DISK_CACHE_SUBDIR", defaults.disk_cache_subdir),
            cache_dir_internal: env_or("CACHE_DIR_INTERNAL", defaults.cache_dir_internal),
            cache_dir_external: env::var("CACHE_DIR_EXTERNAL")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            prefer_external_storage: env_or(
                "PREFER_EXTERNAL_STORAGE",
                defaults.prefer_external_storage,
            ),
            trace_memory_cache: env_or("TRACE_MEMORY_CACHE", defaults.trace_memory_cache),
            trace_disk_cache: env_or("TRACE_DISK_CACHE", defaults.trace_disk_cache),
            trace_loader: env_or("TRACE_LOADER", defaults.trace_loader),
            fetch_connect_timeout_ms: env_or(
                "FETCH_CONNECT_TIMEOUT_MS",
                defaults.fetch_connect_timeout_ms,
            ),
            fetch_read_timeout_ms: env_or("FETCH_READ_TIMEOUT_MS", defaults.fetch_read_timeout_ms),
            image_max_width: env_or("IMAGE_MAX_WIDTH", defaults.image_max_width),
            image_max_height: env_or("IMAGE_MAX_HEIGHT", defaults.image_max_height),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Memory budget selected by the mode setting.
    pub fn memory_budget(&self) -> MemoryBudget {
        match self.memory_budget_mode {
            BudgetMode::Bytes => MemoryBudget::Bytes {
                bytes: self.memory_cache_bytes,
            },
            BudgetMode::Percent => MemoryBudget::Percent {
                percent: self.memory_cache_percent,
                runtime_max_memory: self.runtime_max_memory,
            },
        }
    }

    pub fn disk_cache_config(&self) -> DiskCacheConfig {
        DiskCacheConfig {
            max_size: self.disk_cache_bytes,
            clear_on_startup: self.disk_cache_clear_on_startup,
            prefer_external: self.prefer_external_storage,
            subdirectory: self.disk_cache_subdir.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_read_timeout_ms)
    }

    /// Default tracing filter; the trace toggles raise their module to
    /// `trace` and change nothing else.
    pub fn log_filter(&self) -> String {
        let mut filter = String::from("image_tier_cache=info,tower_http=info");
        let toggles = [
            (self.trace_memory_cache, "image_tier_cache::cache::memory"),
            (self.trace_disk_cache, "image_tier_cache::cache::disk"),
            (self.trace_loader, "image_tier_cache::loader"),
        ];
        for (enabled, target) in toggles {
            if enabled {
                filter.push_str(&format!(",{}=trace", target));
            }
        }
        filter
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_cache_enabled: true,
            memory_budget_mode: BudgetMode::Percent,
            memory_cache_bytes: 16 * MIB,
            memory_cache_percent: 10,
            runtime_max_memory: 256 * MIB,
            disk_cache_enabled: true,
            disk_cache_bytes: 64 * MIB,
            disk_cache_clear_on_startup: false,
            disk_cache_subdir: "images".to_string(),
            cache_dir_internal: env::temp_dir().join("image_tier_cache"),
            cache_dir_external: None,
            prefer_external_storage: true,
            trace_memory_cache: false,
            trace_disk_cache: false,
            trace_loader: false,
            fetch_connect_timeout_ms: 5_000,
            fetch_read_timeout_ms: 10_000,
            image_max_width: 512,
            image_max_height: 512,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
