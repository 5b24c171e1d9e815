//! Disk cache: one PNG file per key in a dedicated directory, bounded by a
//! byte budget with FIFO eviction.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::cache::disk_entry::{id_from_file_name, DiskEntry};
use crate::cache::{CacheStats, FifoTracker};
use crate::error::{CacheError, Result};
use crate::imaging::DecodedImage;
use crate::storage::StorageLocator;

const TMP_SUFFIX: &str = ".tmp";

/// Disk cache configuration.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Maximum bytes of cache files on disk
    pub max_size: u64,
    /// Wipe the directory when the cache is opened
    pub clear_on_startup: bool,
    /// Use removable storage when mounted
    pub prefer_external: bool,
    /// Subdirectory under the storage root
    pub subdirectory: String,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 64 * 1024 * 1024,
            clear_on_startup: false,
            prefer_external: true,
            subdirectory: "images".to_string(),
        }
    }
}

#[derive(Debug)]
struct DiskState {
    /// Identity records, never removed
    entries: HashMap<String, DiskEntry>,
    /// Keys whose files are present, oldest write first
    stored: FifoTracker<String>,
    next_id: u64,
    current_size: u64,
    max_size: u64,
    stats: CacheStats,
}

impl DiskState {
    /// Looks up the identity record for `key`, assigning the next id on
    /// first sight.
    fn identity(&mut self, key: &str) -> &mut DiskEntry {
        let next_id = &mut self.next_id;
        self.entries.entry(key.to_string()).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            trace!(key, id, "new identity record");
            DiskEntry::new(key, id)
        })
    }
}

// == Disk Image Cache ==
/// File-backed image cache owning its directory exclusively.
///
/// `get` and `add` each run as one unit under the store lock, file I/O
/// included, so a key never ends up with two files.
pub struct DiskImageCache {
    dir: PathBuf,
    state: Mutex<DiskState>,
}

impl DiskImageCache {
    // == Constructors ==
    /// Opens the cache subdirectory under the root chosen by `storage`.
    pub fn open(config: &DiskCacheConfig, storage: &dyn StorageLocator) -> Result<Self> {
        let root = storage.cache_directory_path(config.prefer_external);
        Self::open_at(
            root.join(&config.subdirectory),
            config.max_size,
            config.clear_on_startup,
        )
    }

    /// Opens (creating if needed) the cache directory at `dir`.
    ///
    /// With `clear_on_startup` the directory is emptied, removed and
    /// recreated. Otherwise existing files are left alone and new ids start
    /// past the highest id found, so leftovers are never overwritten.
    pub fn open_at(dir: impl Into<PathBuf>, max_size: u64, clear_on_startup: bool) -> Result<Self> {
        let dir = dir.into();
        let next_id = prepare_directory(&dir, clear_on_startup)?;

        info!(
            dir = %dir.display(),
            max_size,
            clear_on_startup,
            "disk image cache opened"
        );

        Ok(Self {
            dir,
            state: Mutex::new(DiskState {
                entries: HashMap::new(),
                stored: FifoTracker::new(),
                next_id,
                current_size: 0,
                max_size,
                stats: CacheStats::new(),
            }),
        })
    }

    // == Get ==
    /// Returns the cached image for `key`.
    ///
    /// A key not marked stored is a miss without any filesystem access. A
    /// stored key whose file is gone is a [`CacheError::Consistency`] error.
    pub fn get(&self, key: &str) -> Result<Option<DecodedImage>> {
        let mut state = self.state.lock();
        let (stored, file_name) = {
            let entry = state.identity(key);
            (entry.stored, entry.file_name.clone())
        };

        if !stored {
            state.stats.record_miss();
            return Ok(None);
        }

        let path = self.dir.join(&file_name);
        if !path.is_file() {
            return Err(CacheError::Consistency {
                path,
                reason: format!("entry for {} is marked stored but no regular file exists", key),
            });
        }

        let image = match image::open(&path) {
            Ok(image) => image,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "unreadable cache file, dropping it");
                self.discard(&mut state, key, &path);
                return Err(CacheError::Decode(format!(
                    "cache file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        state.stats.record_hit();
        trace!(key, path = %path.display(), "disk hit");
        Ok(Some(DecodedImage::new(image)))
    }

    // == Add ==
    /// Writes `image` to the file for `key`, evicting the oldest files first.
    ///
    /// Room is made against the larger of the decoded size and the encoded
    /// PNG, so the budget holds even for images that compress badly. A
    /// failed write leaves the entry not stored and returns
    /// [`CacheError::FileWrite`].
    pub fn add(&self, key: &str, image: &DecodedImage) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        let mut state = self.state.lock();
        if state.max_size == 0 {
            return Err(CacheError::Configuration(
                "disk cache budget must be non-zero".to_string(),
            ));
        }

        let (stored, file_name) = {
            let entry = state.identity(key);
            (entry.stored, entry.file_name.clone())
        };
        if stored {
            trace!(key, "disk add skipped, already stored");
            return Ok(());
        }

        let estimate = image.byte_size();
        if estimate > state.max_size {
            return Err(CacheError::EntryTooLarge {
                key: key.to_string(),
                size: estimate,
                max: state.max_size,
            });
        }

        let path = self.dir.join(&file_name);
        let png = image.encode_png().map_err(|e| CacheError::FileWrite {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let needed = estimate.max(png.len() as u64);
        if needed > state.max_size {
            return Err(CacheError::EntryTooLarge {
                key: key.to_string(),
                size: needed,
                max: state.max_size,
            });
        }

        while state.current_size + needed > state.max_size {
            let Some(oldest) = state.stored.peek_oldest().cloned() else {
                break;
            };
            self.evict(&mut state, &oldest)?;
            state.stored.pop_oldest();
        }

        let size_on_disk = write_file(&path, &png)?;

        state.current_size += size_on_disk;
        state.stored.push(key.to_string());
        let entry = state.identity(key);
        entry.size_in_memory = estimate;
        entry.size_on_disk = size_on_disk;
        entry.stored = true;

        debug!(
            key,
            file = %file_name,
            size_on_disk,
            current_size = state.current_size,
            "disk add"
        );
        Ok(())
    }

    fn evict(&self, state: &mut DiskState, key: &str) -> Result<()> {
        let entry = state.identity(key);
        let path = self.dir.join(&entry.file_name);

        if !path.is_file() {
            return Err(CacheError::Consistency {
                path,
                reason: format!("evicting {} but its file is missing", key),
            });
        }
        fs::remove_file(&path).map_err(|e| CacheError::Consistency {
            path: path.clone(),
            reason: format!("failed to delete evicted file: {}", e),
        })?;

        entry.stored = false;
        let freed = entry.size_on_disk;
        state.current_size -= freed;
        state.stats.record_eviction();
        trace!(key, freed, "disk eviction");
        Ok(())
    }

    /// Forgets a stored file that cannot be used. Deletion is best-effort;
    /// a later add renames over whatever is left.
    fn discard(&self, state: &mut DiskState, key: &str, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove unreadable cache file");
        }
        let entry = state.identity(key);
        entry.stored = false;
        let freed = entry.size_on_disk;
        state.current_size = state.current_size.saturating_sub(freed);
        state.stored.remove(&key.to_string());
    }

    // == Budget ==
    /// Changes the budget for future adds. Nothing is evicted now.
    pub fn set_max_cache_size(&self, bytes: u64) {
        let mut state = self.state.lock();
        info!(old = state.max_size, new = bytes, "disk cache budget changed");
        state.max_size = bytes;
    }

    // == Accessors ==
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn max_size(&self) -> u64 {
        self.state.lock().max_size
    }

    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    pub fn is_stored(&self, key: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|e| e.stored)
            .unwrap_or(false)
    }

    /// Identity record for `key`, if the key was ever seen.
    pub fn entry(&self, key: &str) -> Option<DiskEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Number of identity records, stored or not.
    pub fn identity_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Stored keys from oldest to newest write.
    pub fn stored_keys(&self) -> Vec<String> {
        self.state.lock().stored.iter().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_occupancy(state.stored.len(), state.current_size, state.max_size);
        stats
    }
}

// == Directory Lifecycle ==
/// Readies the cache directory and returns the first free id.
fn prepare_directory(dir: &Path, clear_on_startup: bool) -> Result<u64> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(CacheError::Configuration(format!(
                "cache path {} exists and is not a directory",
                dir.display()
            )));
        }

        if clear_on_startup {
            let mut removed = 0usize;
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                } else {
                    fs::remove_file(&path)?;
                }
                removed += 1;
            }
            fs::remove_dir(dir)?;
            create_directory(dir)?;
            info!(dir = %dir.display(), removed, "disk cache cleared on startup");
            return Ok(1);
        }

        let highest = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(id_from_file_name))
            .max()
            .unwrap_or(0);
        if highest > 0 {
            debug!(dir = %dir.display(), highest, "retaining existing cache files");
        }
        return Ok(highest + 1);
    }

    create_directory(dir)?;
    Ok(1)
}

fn create_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        CacheError::Configuration(format!(
            "cannot create cache directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Writes a temp file and renames it into place.
/// Returns the size of the final file.
fn write_file(path: &Path, png: &[u8]) -> Result<u64> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, png).and_then(|_| fs::rename(&tmp, path)) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %cleanup, "could not remove temp file");
        }
        return Err(CacheError::FileWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    Ok(png.len() as u64)
}
