//! Disk-based image cache with a time-to-live and a byte budget.
//!
//! Each cache directory is flat: one file per [`CacheKey`] plus a
//! `.nomedia` marker. There is no index file; the directory listing and
//! each file's modification time are the whole persisted state. The
//! modification time is both the TTL anchor and the eviction order.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::errors::{LoadError, LoadResult};

/// Maximum disk cache size in bytes per directory (2 MiB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 2 * 1024 * 1024;

/// Age after which a cached file is no longer trusted (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Marker asking media scanners to skip the directory.
pub const NO_MEDIA_MARKER: &str = ".nomedia";

const TEMP_PREFIX: &str = ".tmp-";

/// Outcome of a disk lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskLookup {
    /// A file younger than the TTL was found.
    Hit(Vec<u8>),
    /// A file was found past its TTL and has been deleted.
    Expired,
    /// No usable file.
    Miss,
}

/// Disk-based image cache persisting encoded image bytes.
///
/// Byte totals are tracked per directory. A directory's total is computed
/// once from a listing the first time it is written to, then updated
/// incrementally; every update happens under one lock, so concurrent
/// stores never lose an update.
pub struct DiskImageCache {
    max_size: u64,
    ttl: Duration,
    evict_until_under_budget: bool,
    totals: Mutex<HashMap<PathBuf, u64>>,
}

impl std::fmt::Debug for DiskImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageCache")
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .field("evict_until_under_budget", &self.evict_until_under_budget)
            .finish_non_exhaustive()
    }
}

impl DiskImageCache {
    /// Creates a cache with the given per-directory budget and TTL.
    ///
    /// Each store evicts at most one file; see
    /// [`with_eviction_loop`](Self::with_eviction_loop).
    #[must_use]
    pub fn new(max_size: u64, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            evict_until_under_budget: false,
            totals: Mutex::new(HashMap::new()),
        }
    }

    /// Keeps evicting after a store until the directory is under budget.
    #[must_use]
    pub const fn with_eviction_loop(mut self, enabled: bool) -> Self {
        self.evict_until_under_budget = enabled;
        self
    }

    /// Returns the path for a cached image.
    fn cache_path(dir: &Path, key: &CacheKey) -> PathBuf {
        dir.join(key.as_str())
    }

    /// Looks up `key` in `dir`, deleting the file if it has expired.
    pub async fn lookup(&self, key: &CacheKey, dir: &Path) -> DiskLookup {
        let path = Self::cache_path(dir, key);
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                trace!(key = %key, "Disk cache miss");
                return DiskLookup::Miss;
            }
        };

        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // A timestamp in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            debug!(key = %key, age_secs = age.as_secs(), "Disk cache entry expired");
            self.remove_file(dir, &path).await;
            return DiskLookup::Expired;
        }

        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                DiskLookup::Hit(bytes)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached image");
                DiskLookup::Miss
            }
        }
    }

    /// Writes `bytes` for `key` into `dir`, then enforces the byte budget.
    ///
    /// # Errors
    /// Returns error if the directory or file cannot be written. Callers on
    /// the load path log and drop it; the image was already delivered.
    pub async fn store(&self, key: &CacheKey, dir: &Path, bytes: &[u8]) -> LoadResult<()> {
        let mut totals = self.totals.lock().await;

        if !fs::try_exists(dir).await.unwrap_or(false) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| LoadError::io(format!("Failed to create cache dir: {e}")))?;
            if let Err(e) = fs::File::create(dir.join(NO_MEDIA_MARKER)).await {
                debug!(dir = %dir.display(), error = %e, "Failed to create media marker");
            }
        }

        let path = Self::cache_path(dir, key);
        let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();
        write_atomic(dir, &path, bytes).await?;
        let new_size = bytes.len() as u64;

        let mut total = match totals.get(dir) {
            Some(&total) => total.saturating_sub(old_size.unwrap_or(0)) + new_size,
            None => directory_size(dir).await?,
        };

        debug!(key = %key, path = %path.display(), size = new_size, total, "Stored image in disk cache");

        self.evict_locked(dir, &mut total).await;
        totals.insert(dir.to_path_buf(), total);
        Ok(())
    }

    /// Evicts the oldest file in `dir` if its total exceeds the budget.
    ///
    /// Returns the number of bytes freed.
    pub async fn evict_if_over_budget(&self, dir: &Path) -> u64 {
        let mut totals = self.totals.lock().await;
        let mut total = match totals.get(dir) {
            Some(&total) => total,
            None => match directory_size(dir).await {
                Ok(total) => total,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to size cache dir");
                    return 0;
                }
            },
        };
        let freed = self.evict_locked(dir, &mut total).await;
        totals.insert(dir.to_path_buf(), total);
        freed
    }

    async fn evict_locked(&self, dir: &Path, total: &mut u64) -> u64 {
        let mut freed = 0u64;

        while *total > self.max_size {
            debug!(
                dir = %dir.display(),
                current_size = *total,
                max_size = self.max_size,
                "Disk cache over limit, evicting oldest file"
            );

            let Some((path, size)) = oldest_file(dir).await else {
                break;
            };
            match fs::remove_file(&path).await {
                Ok(()) => {
                    *total = total.saturating_sub(size);
                    freed += size;
                    debug!(path = %path.display(), size, "Removed old cache file");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
                    break;
                }
            }

            if !self.evict_until_under_budget {
                break;
            }
        }

        freed
    }

    /// Removes an image from disk cache.
    pub async fn evict(&self, key: &CacheKey, dir: &Path) {
        let path = Self::cache_path(dir, key);
        self.remove_file(dir, &path).await;
    }

    async fn remove_file(&self, dir: &Path, path: &Path) {
        let mut totals = self.totals.lock().await;
        let size = fs::metadata(path).await.map(|m| m.len()).ok();
        match fs::remove_file(path).await {
            Ok(()) => {
                if let (Some(total), Some(size)) = (totals.get_mut(dir), size) {
                    *total = total.saturating_sub(size);
                }
                debug!(path = %path.display(), "Evicted from disk cache");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to evict from disk cache"),
        }
    }

    /// Deletes every cached image in `dir`, keeping the marker.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be read.
    pub async fn clear(&self, dir: &Path) -> LoadResult<()> {
        let mut totals = self.totals.lock().await;
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read cache dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoadError::io(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if entry.file_name() != NO_MEDIA_MARKER
                && entry.file_type().await.is_ok_and(|t| t.is_file())
                && fs::remove_file(&path).await.is_err()
            {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }

        totals.insert(dir.to_path_buf(), directory_size(dir).await?);
        debug!(dir = %dir.display(), "Cleared disk cache");
        Ok(())
    }

    /// Returns the tracked byte total for `dir`, if it has been computed.
    pub async fn current_size(&self, dir: &Path) -> Option<u64> {
        self.totals.lock().await.get(dir).copied()
    }

    /// Checks if an image is cached, regardless of age.
    pub async fn contains(&self, key: &CacheKey, dir: &Path) -> bool {
        fs::try_exists(Self::cache_path(dir, key))
            .await
            .unwrap_or(false)
    }

    /// Configured per-directory budget.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for DiskImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_SIZE, DEFAULT_TTL)
    }
}

/// Writes through a temp file in the same directory so readers never see a
/// partial image.
async fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> LoadResult<()> {
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| LoadError::unexpected(format!("Write task panicked: {e}")))?
    .map_err(|e| LoadError::io(format!("Failed to write cache file: {e}")))
}

/// Sums the sizes of all regular files in `dir`.
async fn directory_size(dir: &Path) -> LoadResult<u64> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| LoadError::io(format!("Failed to read cache dir: {e}")))?;

    let mut total = 0u64;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(meta) = entry.metadata().await
            && meta.is_file()
        {
            total += meta.len();
        }
    }
    trace!(dir = %dir.display(), total, "Computed cache dir size");
    Ok(total)
}

/// Finds the regular file with the oldest modification time.
///
/// Skips the marker and in-progress temp files.
async fn oldest_file(dir: &Path) -> Option<(PathBuf, u64)> {
    let mut entries = fs::read_dir(dir).await.ok()?;
    let mut oldest: Option<(PathBuf, SystemTime, u64)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if name == NO_MEDIA_MARKER || name.to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if oldest.as_ref().is_none_or(|(_, time, _)| modified < *time) {
            oldest = Some((entry.path(), modified, meta.len()));
        }
    }

    oldest.map(|(path, _, size)| (path, size))
}
