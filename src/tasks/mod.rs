//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the service.
//!
//! # Tasks
//! - Reconfiguration: applies settings changes by swapping cache instances

mod reconfigure;

pub use reconfigure::{
    spawn_reconfigure_task, CacheSettings, SettingsChange, SETTINGS_CHANNEL_CAPACITY,
};
