//! Cache Reconfiguration Task
//!
//! Background task applying settings changes to the loader's cache tiers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::{DiskCacheConfig, DiskImageCache, MemoryBudget, MemoryImageCache};
use crate::loader::Loader;
use crate::storage::StorageLocator;

/// Queue depth of the settings channel.
pub const SETTINGS_CHANNEL_CAPACITY: usize = 32;

/// One settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    MemoryEnabled(bool),
    MemoryBudget(MemoryBudget),
    DiskEnabled(bool),
    DiskMaxSize(u64),
}

/// Settings in effect, plus the single disk cache instance.
///
/// The disk instance outlives "disabled" periods so its directory keeps one
/// owner for the whole process.
pub struct CacheSettings {
    pub memory_enabled: bool,
    pub memory_budget: MemoryBudget,
    pub disk_enabled: bool,
    pub disk_config: DiskCacheConfig,
    disk: Option<Arc<DiskImageCache>>,
    storage: Arc<dyn StorageLocator>,
}

impl CacheSettings {
    pub fn new(
        memory_enabled: bool,
        memory_budget: MemoryBudget,
        disk_enabled: bool,
        disk_config: DiskCacheConfig,
        disk: Option<Arc<DiskImageCache>>,
        storage: Arc<dyn StorageLocator>,
    ) -> Self {
        Self {
            memory_enabled,
            memory_budget,
            disk_enabled,
            disk_config,
            disk,
            storage,
        }
    }

    // == Apply ==
    /// Applies one change to `loader`.
    ///
    /// Memory changes build a fresh cache and swap it in; the old one's
    /// contents are dropped. Disk budget changes adjust the existing
    /// instance in place.
    pub fn apply(&mut self, loader: &Loader, change: SettingsChange) {
        debug!(?change, "applying settings change");
        match change {
            SettingsChange::MemoryEnabled(enabled) => {
                self.memory_enabled = enabled;
                self.swap_memory(loader);
            }
            SettingsChange::MemoryBudget(budget) => {
                self.memory_budget = budget;
                self.swap_memory(loader);
            }
            SettingsChange::DiskEnabled(enabled) => {
                self.disk_enabled = enabled;
                if !enabled {
                    loader.replace_disk_cache(None);
                    return;
                }
                match self.disk_instance() {
                    Some(disk) => loader.replace_disk_cache(Some(disk)),
                    None => loader.replace_disk_cache(None),
                }
            }
            SettingsChange::DiskMaxSize(bytes) => {
                self.disk_config.max_size = bytes;
                if let Some(disk) = &self.disk {
                    disk.set_max_cache_size(bytes);
                }
            }
        }
    }

    fn swap_memory(&self, loader: &Loader) {
        let cache = self
            .memory_enabled
            .then(|| Arc::new(MemoryImageCache::from_budget(self.memory_budget)));
        loader.replace_memory_cache(cache);
    }

    /// The disk cache, opened on first use.
    fn disk_instance(&mut self) -> Option<Arc<DiskImageCache>> {
        if self.disk.is_none() {
            match DiskImageCache::open(&self.disk_config, self.storage.as_ref()) {
                Ok(disk) => self.disk = Some(Arc::new(disk)),
                Err(err) => {
                    error!(error = %err, "cannot open disk cache, leaving it disabled");
                    return None;
                }
            }
        }
        self.disk.clone()
    }
}

/// Spawns the task that applies settings changes in arrival order.
///
/// # Returns
/// A JoinHandle for the spawned task. The task ends when every sender is
/// dropped, and can also be aborted during shutdown.
pub fn spawn_reconfigure_task(
    loader: Loader,
    mut settings: CacheSettings,
    mut changes: mpsc::Receiver<SettingsChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache reconfiguration task");

        while let Some(change) = changes.recv().await {
            settings.apply(&loader, change);
        }

        info!("Cache reconfiguration task finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetch::Fetcher;
    use crate::loader::ui_channel;
    use crate::storage::FsStorage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    struct NoNetwork;

    #[async_trait]
    impl Fetcher for NoNetwork {
        async fn fetch_bytes(&self, key: &str) -> Result<Bytes> {
            Err(crate::error::CacheError::Fetch {
                key: key.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn settings(tmp: &TempDir, disk: Option<Arc<DiskImageCache>>) -> CacheSettings {
        CacheSettings::new(
            true,
            MemoryBudget::Bytes { bytes: 1000 },
            disk.is_some(),
            DiskCacheConfig {
                max_size: 10_000,
                ..DiskCacheConfig::default()
            },
            disk,
            Arc::new(FsStorage::new(tmp.path(), None)),
        )
    }

    fn loader() -> Loader {
        let (ui, _ui_loop) = ui_channel();
        Loader::builder(Arc::new(NoNetwork), ui)
            .memory_cache(Arc::new(MemoryImageCache::with_byte_budget(1000)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_budget_change_swaps_memory_instance() {
        let tmp = TempDir::new().unwrap();
        let loader = loader();
        let before = loader.memory_cache().unwrap();
        before
            .add("k", crate::imaging::DecodedImage::placeholder())
            .unwrap();

        let mut settings = settings(&tmp, None);
        settings.apply(
            &loader,
            SettingsChange::MemoryBudget(MemoryBudget::Percent {
                percent: 50,
                runtime_max_memory: 4000,
            }),
        );

        let after = loader.memory_cache().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.max_size(), 2000);
        assert!(!after.contains("k"));
    }

    #[tokio::test]
    async fn test_memory_toggle() {
        let tmp = TempDir::new().unwrap();
        let loader = loader();
        let mut settings = settings(&tmp, None);

        settings.apply(&loader, SettingsChange::MemoryEnabled(false));
        assert!(loader.memory_cache().is_none());

        settings.apply(&loader, SettingsChange::MemoryEnabled(true));
        assert_eq!(loader.memory_cache().unwrap().max_size(), 1000);
    }

    #[tokio::test]
    async fn test_disk_toggle_reuses_instance() {
        let tmp = TempDir::new().unwrap();
        let loader = loader();
        let mut settings = settings(&tmp, None);

        settings.apply(&loader, SettingsChange::DiskEnabled(true));
        let first = loader.disk_cache().unwrap();
        assert_eq!(first.directory(), tmp.path().join("images"));

        settings.apply(&loader, SettingsChange::DiskEnabled(false));
        assert!(loader.disk_cache().is_none());

        settings.apply(&loader, SettingsChange::DiskEnabled(true));
        assert!(Arc::ptr_eq(&first, &loader.disk_cache().unwrap()));
    }

    #[tokio::test]
    async fn test_disk_max_size_adjusts_in_place() {
        let tmp = TempDir::new().unwrap();
        let disk = Arc::new(DiskImageCache::open_at(tmp.path().join("d"), 10_000, false).unwrap());
        let loader = loader();
        loader.replace_disk_cache(Some(Arc::clone(&disk)));
        let mut settings = settings(&tmp, Some(Arc::clone(&disk)));

        settings.apply(&loader, SettingsChange::DiskMaxSize(777));

        assert_eq!(disk.max_size(), 777);
        assert!(Arc::ptr_eq(&disk, &loader.disk_cache().unwrap()));
    }

    #[tokio::test]
    async fn test_task_applies_changes_and_stops() {
        let tmp = TempDir::new().unwrap();
        let loader = loader();
        let (tx, rx) = mpsc::channel(SETTINGS_CHANNEL_CAPACITY);

        let handle = spawn_reconfigure_task(loader.clone(), settings(&tmp, None), rx);
        tx.send(SettingsChange::MemoryEnabled(false)).await.unwrap();
        drop(tx);

        handle.await.unwrap();
        assert!(loader.memory_cache().is_none());
    }
}
