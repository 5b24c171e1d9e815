//! Disk Entry Module
//!
//! Permanent per-key identity record kept by the disk cache.

/// File extension of every cache file.
pub const CACHE_FILE_EXTENSION: &str = "png";

const CACHE_FILE_PREFIX: &str = "img_";

// == Disk Entry ==
/// Identity record for one key ever seen by the disk cache.
///
/// Records outlive eviction so a key maps to the same file name for its
/// whole history; only `stored` flips when the file comes and goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    /// The key (a URL in practice)
    pub key: String,
    /// Monotonic id, 1:1 with the key
    pub id: u64,
    /// File name derived from `id`
    pub file_name: String,
    /// Decoded size of the last image written, used as the eviction estimate
    pub size_in_memory: u64,
    /// Encoded file size, known only after a write
    pub size_on_disk: u64,
    /// Whether the file currently exists in the cache directory
    pub stored: bool,
}

impl DiskEntry {
    // == Constructor ==
    /// Creates a not-yet-stored record for `key`.
    pub fn new(key: impl Into<String>, id: u64) -> Self {
        Self {
            key: key.into(),
            id,
            file_name: file_name_for(id),
            size_in_memory: 0,
            size_on_disk: 0,
            stored: false,
        }
    }
}

// == File Naming ==
/// Deterministic file name for an identity id.
pub fn file_name_for(id: u64) -> String {
    format!("{}{}.{}", CACHE_FILE_PREFIX, id, CACHE_FILE_EXTENSION)
}

/// Recovers the id from a file name produced by [`file_name_for`].
pub fn id_from_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(CACHE_FILE_PREFIX)?
        .strip_suffix(CACHE_FILE_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}
