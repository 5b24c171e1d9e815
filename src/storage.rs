//! Storage Module
//!
//! Resolves where the disk cache directory lives.

use std::path::PathBuf;

use tracing::debug;

/// Locates the root directory that cache subdirectories are created under.
pub trait StorageLocator: Send + Sync {
    fn cache_directory_path(&self, prefer_external: bool) -> PathBuf;
}

/// Filesystem storage with an optional removable ("external") root.
///
/// The external root is used only when preferred and currently mounted,
/// i.e. it exists as a directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    internal: PathBuf,
    external: Option<PathBuf>,
}

impl FsStorage {
    pub fn new(internal: impl Into<PathBuf>, external: Option<PathBuf>) -> Self {
        Self {
            internal: internal.into(),
            external,
        }
    }
}

impl StorageLocator for FsStorage {
    fn cache_directory_path(&self, prefer_external: bool) -> PathBuf {
        if prefer_external {
            if let Some(external) = self.external.as_ref().filter(|p| p.is_dir()) {
                debug!(path = %external.display(), "using external storage");
                return external.clone();
            }
        }
        self.internal.clone()
    }
}
