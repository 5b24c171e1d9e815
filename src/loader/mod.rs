//! Loader Module
//!
//! Resolves images for display slots through memory, disk and network, in
//! that order, and delivers them on the UI context.

mod notify;
mod slot;
mod ui;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{DiskImageCache, MemoryImageCache};
use crate::error::{CacheError, Result};
use crate::fetch::Fetcher;
use crate::imaging::{DecodedImage, Decoder, SampledDecoder};

pub use notify::{Notifier, TracingNotifier};
pub use slot::{DisplaySurface, Slot};
pub use ui::{ui_channel, UiHandle, UiLoop};

/// Default decoder bounding box.
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

/// Where a background resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Disk,
    Network,
    Placeholder,
}

struct LoaderInner {
    memory: RwLock<Option<Arc<MemoryImageCache>>>,
    disk: RwLock<Option<Arc<DiskImageCache>>>,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    notifier: Arc<dyn Notifier>,
    ui: UiHandle,
    runtime: Handle,
    placeholder: DecodedImage,
    max_width: u32,
    max_height: u32,
}

// == Loader ==
/// Orchestrates the memory → disk → network pipeline for display slots.
///
/// Cache tiers are held behind swappable references: reconfiguration
/// replaces a whole cache instance instead of mutating one in place. Loads
/// already running keep the instance they started with.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Loader {
    pub fn builder(fetcher: Arc<dyn Fetcher>, ui: UiHandle) -> LoaderBuilder {
        LoaderBuilder::new(fetcher, ui)
    }

    // == Load ==
    /// Requests `key` for `slot`.
    ///
    /// A memory hit is shown immediately and `None` is returned. Otherwise a
    /// background task resolves the image and posts delivery to the UI
    /// context; its handle is returned for callers that want to wait.
    /// Results for a key the slot no longer wants are never shown.
    pub fn load(&self, slot: &Slot, key: &str) -> Option<JoinHandle<()>> {
        slot.set_desired_key(key);

        if let Some(memory) = self.memory_cache() {
            if let Some(image) = memory.get(key) {
                trace!(key, "memory hit");
                slot.show(image);
                return None;
            }
        }

        let inner = Arc::clone(&self.inner);
        let slot = slot.clone();
        let requested = key.to_string();

        Some(self.inner.runtime.spawn(async move {
            let image = match inner.resolve(&slot, &requested).await {
                Ok((image, resolution)) => {
                    debug!(key = %requested, ?resolution, "load resolved");
                    image
                }
                Err(err) => {
                    error!(key = %requested, error = %err, "load aborted");
                    inner.placeholder.clone()
                }
            };
            inner.deliver(slot, requested, image);
        }))
    }

    // == Tier Access ==
    pub fn memory_cache(&self) -> Option<Arc<MemoryImageCache>> {
        self.inner.memory.read().clone()
    }

    pub fn disk_cache(&self) -> Option<Arc<DiskImageCache>> {
        self.inner.disk.read().clone()
    }

    /// Swaps the memory tier. The old instance and its contents are dropped
    /// once in-flight loads release it.
    pub fn replace_memory_cache(&self, cache: Option<Arc<MemoryImageCache>>) {
        info!(
            max_size = cache.as_ref().map(|c| c.max_size()),
            "memory cache replaced"
        );
        *self.inner.memory.write() = cache;
    }

    /// Swaps the disk tier.
    pub fn replace_disk_cache(&self, cache: Option<Arc<DiskImageCache>>) {
        info!(enabled = cache.is_some(), "disk cache replaced");
        *self.inner.disk.write() = cache;
    }

    pub fn placeholder(&self) -> &DecodedImage {
        &self.inner.placeholder
    }
}

impl LoaderInner {
    fn memory_cache(&self) -> Option<Arc<MemoryImageCache>> {
        self.memory.read().clone()
    }

    fn disk_cache(&self) -> Option<Arc<DiskImageCache>> {
        self.disk.read().clone()
    }

    /// Background half of a load. Recoverable failures resolve to the
    /// placeholder; fatal ones are returned.
    async fn resolve(&self, slot: &Slot, requested: &str) -> Result<(DecodedImage, Resolution)> {
        if requested.is_empty() {
            return Ok((self.placeholder.clone(), Resolution::Placeholder));
        }

        if let Some(disk) = self.disk_cache() {
            let key = requested.to_string();
            let lookup = tokio::task::spawn_blocking(move || disk.get(&key))
                .await
                .map_err(|e| CacheError::Internal(format!("disk lookup task: {}", e)))?;

            match lookup {
                Ok(Some(image)) => {
                    self.remember_in_memory(requested, &image);
                    return Ok((image, Resolution::Disk));
                }
                Ok(None) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(key = requested, error = %err, "unreadable disk entry, refetching");
                }
                Err(err) => return Err(err),
            }
        }

        let image = match self.fetch_and_decode(requested).await {
            Ok(image) => image,
            Err(err) => {
                warn!(key = requested, error = %err, "image load failed");
                self.notify(slot, format!("Could not load image: {}", err));
                return Ok((self.placeholder.clone(), Resolution::Placeholder));
            }
        };

        if !slot.wants(requested) {
            info!(
                key = requested,
                desired = ?slot.desired_key(),
                "slot moved on while fetching, discarding result"
            );
            return Ok((self.placeholder.clone(), Resolution::Placeholder));
        }

        self.remember_in_memory(requested, &image);

        if let Some(disk) = self.disk_cache() {
            let key = requested.to_string();
            let copy = image.clone();
            let stored = tokio::task::spawn_blocking(move || disk.add(&key, &copy))
                .await
                .map_err(|e| CacheError::Internal(format!("disk write task: {}", e)))?;

            match stored {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(key = requested, error = %err, "disk cache write failed");
                    self.notify(slot, format!("Could not save image to cache: {}", err));
                }
                Err(CacheError::EntryTooLarge { size, max, .. }) => {
                    debug!(key = requested, size, max, "image too large for disk cache");
                }
                Err(err) => return Err(err),
            }
        }

        Ok((image, Resolution::Network))
    }

    async fn fetch_and_decode(&self, key: &str) -> Result<DecodedImage> {
        let bytes = self.fetcher.fetch_bytes(key).await?;

        let decoder = Arc::clone(&self.decoder);
        let (max_width, max_height) = (self.max_width, self.max_height);
        tokio::task::spawn_blocking(move || decoder.decode(&bytes, max_width, max_height))
            .await
            .map_err(|e| CacheError::Internal(format!("decode task: {}", e)))?
    }

    fn remember_in_memory(&self, key: &str, image: &DecodedImage) {
        let Some(memory) = self.memory_cache() else {
            return;
        };
        if let Err(err) = memory.add(key, image.clone()) {
            warn!(key, error = %err, "memory cache add failed");
        }
    }

    /// Shows `image` on the UI context, unless the slot has been handed a
    /// different key since `requested` was dispatched.
    fn deliver(&self, slot: Slot, requested: String, image: DecodedImage) {
        self.ui.post(move || {
            if !slot.wants(&requested) {
                debug!(
                    key = %requested,
                    desired = ?slot.desired_key(),
                    "slot moved on, delivery skipped"
                );
                return;
            }
            slot.show(image);
        });
    }

    fn notify(&self, slot: &Slot, message: String) {
        let slot = slot.clone();
        let notifier = Arc::clone(&self.notifier);
        self.ui.post(move || {
            if slot.is_alive() {
                notifier.display(&message);
            }
        });
    }
}

// == Loader Builder ==
/// Builder for a [`Loader`].
///
/// Both cache tiers start disabled; the decoder defaults to
/// [`SampledDecoder`], the notifier to [`TracingNotifier`] and the runtime
/// to the current Tokio runtime.
pub struct LoaderBuilder {
    fetcher: Arc<dyn Fetcher>,
    ui: UiHandle,
    memory: Option<Arc<MemoryImageCache>>,
    disk: Option<Arc<DiskImageCache>>,
    decoder: Option<Arc<dyn Decoder>>,
    notifier: Option<Arc<dyn Notifier>>,
    runtime: Option<Handle>,
    placeholder: Option<DecodedImage>,
    max_width: u32,
    max_height: u32,
}

impl LoaderBuilder {
    pub fn new(fetcher: Arc<dyn Fetcher>, ui: UiHandle) -> Self {
        Self {
            fetcher,
            ui,
            memory: None,
            disk: None,
            decoder: None,
            notifier: None,
            runtime: None,
            placeholder: None,
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
        }
    }

    pub fn memory_cache(mut self, cache: Arc<MemoryImageCache>) -> Self {
        self.memory = Some(cache);
        self
    }

    pub fn disk_cache(mut self, cache: Arc<DiskImageCache>) -> Self {
        self.disk = Some(cache);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn placeholder(mut self, placeholder: DecodedImage) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Bounding box handed to the decoder.
    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Builds the loader. Fails outside a Tokio runtime when no runtime
    /// handle was supplied.
    pub fn build(self) -> Result<Loader> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                CacheError::Configuration(format!("loader needs a Tokio runtime: {}", e))
            })?,
        };

        Ok(Loader {
            inner: Arc::new(LoaderInner {
                memory: RwLock::new(self.memory),
                disk: RwLock::new(self.disk),
                fetcher: self.fetcher,
                decoder: self.decoder.unwrap_or_else(|| Arc::new(SampledDecoder)),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                ui: self.ui,
                runtime,
                placeholder: self.placeholder.unwrap_or_else(DecodedImage::placeholder),
                max_width: self.max_width,
                max_height: self.max_height,
            }),
        })
    }
}
