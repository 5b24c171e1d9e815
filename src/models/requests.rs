//! Request DTOs for the image cache API
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;

use crate::cache::MemoryBudget;
use crate::tasks::SettingsChange;

/// Query string for GET /image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    /// The image key (URL). Empty resolves to the placeholder.
    #[serde(default)]
    pub url: String,
}

/// Request body for PUT /settings
///
/// Every field is optional; only the ones present are changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub memory_enabled: Option<bool>,
    #[serde(default)]
    pub memory_budget: Option<MemoryBudget>,
    #[serde(default)]
    pub disk_enabled: Option<bool>,
    #[serde(default)]
    pub disk_max_bytes: Option<u64>,
}

impl SettingsRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.memory_budget {
            Some(MemoryBudget::Bytes { bytes: 0 }) => {
                return Some("Memory budget must be non-zero".to_string());
            }
            Some(MemoryBudget::Percent { percent, .. }) if percent == 0 || percent > 100 => {
                return Some("Memory percent must be between 1 and 100".to_string());
            }
            Some(MemoryBudget::Percent {
                runtime_max_memory: 0,
                ..
            }) => {
                return Some("runtime_max_memory must be non-zero".to_string());
            }
            _ => {}
        }
        if self.disk_max_bytes == Some(0) {
            return Some("Disk budget must be non-zero".to_string());
        }
        None
    }

    /// Settings changes in a fixed order: budgets before enable toggles,
    /// so enabling a tier picks up a budget sent in the same request.
    pub fn into_changes(self) -> Vec<SettingsChange> {
        let mut changes = Vec::new();
        if let Some(budget) = self.memory_budget {
            changes.push(SettingsChange::MemoryBudget(budget));
        }
        if let Some(enabled) = self.memory_enabled {
            changes.push(SettingsChange::MemoryEnabled(enabled));
        }
        if let Some(bytes) = self.disk_max_bytes {
            changes.push(SettingsChange::DiskMaxSize(bytes));
        }
        if let Some(enabled) = self.disk_enabled {
            changes.push(SettingsChange::DiskEnabled(enabled));
        }
        changes
    }
}
