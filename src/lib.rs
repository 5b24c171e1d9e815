//! Image Tier Cache - a two-tier image cache with a network loader
//!
//! Decoded images are kept in a size-bounded memory tier, encoded copies in
//! a size-bounded disk tier, and misses fall through to the network.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod imaging;
pub mod loader;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use loader::Loader;
pub use tasks::spawn_reconfigure_task;
