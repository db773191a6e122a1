//! Async image loading orchestrator.
//!
//! Implements a three-tier cache: Memory -> Disk -> Network
//!
//! [`ImageLoader::submit`] runs on the caller's thread and only touches the
//! memory tier and the pending registry. Disk lookups and downloads run on
//! the worker pool. For any one target, only the most recently submitted
//! request can produce an [`ImageLoadedEvent`]; superseded requests finish
//! silently.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::domain::entities::{CacheKey, ImageSource, LoadedImage, TargetId};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{ImageCachePort, ImageFetcherPort, ImageRequest};

use super::codec;
use super::disk_cache::{DiskImageCache, DiskLookup};
use super::http_fetcher::HttpImageFetcher;
use super::memory_cache::{CacheStats, MemoryImageCache};
use super::pending::{Pending, PendingRequests, Stage};
use super::worker_pool::WorkerPool;

/// Message sent when a request finishes loading.
#[derive(Debug, Clone)]
pub struct ImageLoadedEvent {
    /// Display slot the request was for.
    pub target: TargetId,
    /// Cache key of the requested image.
    pub key: CacheKey,
    /// The loaded image, or why it could not be loaded.
    pub result: Result<LoadedImage, LoadError>,
}

/// Configuration for the image loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLoaderConfig {
    /// Memory tier budget, in bytes of decoded pixels.
    pub memory_cache_bytes: usize,
    /// Disk tier budget per cache directory, in bytes.
    pub disk_cache_bytes: u64,
    /// Age in seconds after which a disk file is refetched.
    pub disk_ttl_secs: u64,
    /// Keep evicting after a store until under budget, instead of once.
    pub evict_until_under_budget: bool,
    /// Maximum concurrent disk and network tasks.
    pub workers: usize,
    /// Read timeout for downloads, in seconds.
    pub read_timeout_secs: u64,
    /// Connect timeout for downloads, in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum redirects followed per download.
    pub max_redirects: usize,
    /// Upper bound on decoder allocations, in bytes.
    pub max_decode_bytes: u64,
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache_bytes: super::memory_cache::DEFAULT_MEMORY_CACHE_BYTES,
            disk_cache_bytes: super::disk_cache::DEFAULT_MAX_CACHE_SIZE,
            disk_ttl_secs: super::disk_cache::DEFAULT_TTL.as_secs(),
            evict_until_under_budget: false,
            workers: super::worker_pool::DEFAULT_WORKERS,
            read_timeout_secs: super::http_fetcher::DEFAULT_READ_TIMEOUT.as_secs(),
            connect_timeout_secs: 10,
            max_redirects: 10,
            max_decode_bytes: 128 * 1024 * 1024,
        }
    }
}

impl ImageLoaderConfig {
    /// Disk TTL as a duration.
    #[must_use]
    pub const fn disk_ttl(&self) -> Duration {
        Duration::from_secs(self.disk_ttl_secs)
    }

    /// Read timeout as a duration.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Connect timeout as a duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// State guarded by the loader's single lock.
struct LoaderState {
    memory_cache: MemoryImageCache,
    pending: PendingRequests,
}

struct LoaderInner {
    state: Mutex<LoaderState>,
    disk_cache: DiskImageCache,
    fetcher: Arc<dyn ImageFetcherPort>,
    pool: WorkerPool,
    event_tx: mpsc::UnboundedSender<ImageLoadedEvent>,
    config: ImageLoaderConfig,
}

/// Orchestrates image loading from memory, disk, and network.
///
/// Cheap to clone; clones share caches, registries and workers.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader running its stages on `handle`.
    #[must_use]
    pub fn new(
        config: ImageLoaderConfig,
        event_tx: &mpsc::UnboundedSender<ImageLoadedEvent>,
        fetcher: Arc<dyn ImageFetcherPort>,
        handle: Handle,
    ) -> Self {
        let disk_cache = DiskImageCache::new(config.disk_cache_bytes, config.disk_ttl())
            .with_eviction_loop(config.evict_until_under_budget);

        let inner = LoaderInner {
            state: Mutex::new(LoaderState {
                memory_cache: MemoryImageCache::new(config.memory_cache_bytes),
                pending: PendingRequests::new(),
            }),
            disk_cache,
            fetcher,
            pool: WorkerPool::new(handle, config.workers),
            event_tx: event_tx.clone(),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a loader downloading over HTTP on the current tokio runtime.
    ///
    /// # Errors
    /// Returns error if no runtime is active or the HTTP client cannot be created.
    pub fn with_http(
        config: ImageLoaderConfig,
        event_tx: &mpsc::UnboundedSender<ImageLoadedEvent>,
    ) -> LoadResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| LoadError::unexpected(format!("No tokio runtime: {e}")))?;
        let fetcher = HttpImageFetcher::new(
            config.read_timeout(),
            config.connect_timeout(),
            config.max_redirects,
        )?;
        Ok(Self::new(config, event_tx, Arc::new(fetcher), handle))
    }

    /// Submits a request; the outcome arrives on the loader's event channel.
    ///
    /// A memory hit is delivered before this returns. Otherwise the request
    /// is queued and any older request for the same target is voided.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidRequest`] if validation fails; nothing is
    /// scheduled in that case.
    pub fn submit(&self, request: Arc<dyn ImageRequest>) -> LoadResult<()> {
        self.submit_with(request, self.inner.event_tx.clone())
    }

    /// Like [`submit`](Self::submit), delivering to `reply` instead.
    ///
    /// If the request is superseded, `reply` is dropped without a message.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidRequest`] if validation fails.
    pub fn submit_with(
        &self,
        request: Arc<dyn ImageRequest>,
        reply: mpsc::UnboundedSender<ImageLoadedEvent>,
    ) -> LoadResult<()> {
        if let Err(e) = request.validate() {
            debug!(slot = %request.target(), error = %e, "Rejected image request");
            return Err(e);
        }

        let target = request.target().clone();
        let key = request.cache_key();

        let hit = {
            let mut state = self.inner.state.lock();
            let generation = state.pending.begin(&target);
            if let Some(image) = state.memory_cache.get(&key) {
                state.pending.finish(&target, generation);
                Some(image)
            } else {
                let pending = Pending {
                    generation,
                    request,
                    reply: reply.clone(),
                };
                state.pending.supersede(Stage::Disk, &target, pending);
                None
            }
        };

        if let Some(image) = hit {
            let loaded = LoadedImage {
                key: key.clone(),
                image,
                source: ImageSource::MemoryCache,
            };
            deliver(&reply, target, key, Ok(loaded));
            return Ok(());
        }

        trace!(slot = %target, key = %key, "Queued disk lookup");
        let inner = self.inner.clone();
        self.inner
            .pool
            .spawn(&key, async move { inner.disk_stage(target).await });
        Ok(())
    }

    /// Submits a request and waits for its outcome.
    ///
    /// Returns `None` if a newer request for the same target superseded it.
    pub async fn load(&self, request: Arc<dyn ImageRequest>) -> Option<LoadResult<LoadedImage>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = self.submit_with(request, tx) {
            return Some(Err(e));
        }
        rx.recv().await.map(|event| event.result)
    }

    /// Checks the memory tier without promoting the entry.
    #[must_use]
    pub fn check_memory_cache(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        self.inner.state.lock().memory_cache.peek(key)
    }

    /// Returns the number of targets with an undelivered request.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.in_flight()
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.inner.state.lock().memory_cache.stats()
    }

    /// Drops every image from the memory tier.
    pub fn clear_memory(&self) {
        self.inner.state.lock().memory_cache.clear();
    }

    /// The disk tier.
    #[must_use]
    pub fn disk_cache(&self) -> &DiskImageCache {
        &self.inner.disk_cache
    }

    /// The loader's configuration.
    #[must_use]
    pub fn config(&self) -> &ImageLoaderConfig {
        &self.inner.config
    }
}

fn deliver(
    reply: &mpsc::UnboundedSender<ImageLoadedEvent>,
    target: TargetId,
    key: CacheKey,
    result: Result<LoadedImage, LoadError>,
) {
    if reply
        .send(ImageLoadedEvent {
            target: target.clone(),
            key,
            result,
        })
        .is_err()
    {
        error!(slot = %target, "Image event receiver dropped");
    }
}

impl LoaderInner {
    async fn disk_stage(self: Arc<Self>, target: TargetId) {
        let Some(pending) = self.state.lock().pending.consume(Stage::Disk, &target) else {
            trace!(slot = %target, "Disk lookup already taken by another task");
            return;
        };
        let key = pending.request.cache_key();

        if let DiskLookup::Hit(bytes) = self
            .disk_cache
            .lookup(&key, pending.request.cache_dir())
            .await
        {
            match self.decode(bytes).await {
                Ok(image) => {
                    self.complete(&pending, &key, Arc::new(image), ImageSource::DiskCache);
                    return;
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Cached image unreadable, falling back to network");
                }
            }
        }

        self.schedule_network(target, pending);
    }

    fn schedule_network(self: Arc<Self>, target: TargetId, pending: Pending) {
        let key = pending.request.cache_key();
        {
            let mut state = self.state.lock();
            if !state.pending.is_current(&target, pending.generation) {
                trace!(slot = %target, "Superseded before network stage");
                return;
            }
            state.pending.supersede(Stage::Network, &target, pending);
        }

        trace!(slot = %target, key = %key, "Queued network fetch");
        let inner = self.clone();
        self.pool
            .spawn(&key, async move { inner.network_stage(target).await });
    }

    async fn network_stage(self: Arc<Self>, target: TargetId) {
        let Some(pending) = self.state.lock().pending.consume(Stage::Network, &target) else {
            trace!(slot = %target, "Network fetch already taken by another task");
            return;
        };
        let key = pending.request.cache_key();

        match self.fetch_and_process(pending.request.clone()).await {
            Ok(image) => {
                let image = Arc::new(image);
                if self.complete(&pending, &key, image.clone(), ImageSource::Network) {
                    self.persist(&key, pending.request.cache_dir(), image).await;
                }
            }
            Err(err) => {
                let owned = self.state.lock().pending.finish(&target, pending.generation);
                if owned {
                    warn!(slot = %target, key = %key, error = %err, "Image load failed");
                    deliver(&pending.reply, target, key, Err(err));
                } else {
                    debug!(slot = %target, error = %err, "Dropped failure of superseded request");
                }
            }
        }
    }

    /// Delivers `image` if `pending` is still current and caches it in memory.
    ///
    /// Returns false, dropping the image, when the request was superseded.
    fn complete(
        &self,
        pending: &Pending,
        key: &CacheKey,
        image: Arc<image::DynamicImage>,
        source: ImageSource,
    ) -> bool {
        let target = pending.request.target();
        {
            let mut state = self.state.lock();
            if !state.pending.finish(target, pending.generation) {
                debug!(slot = %target, key = %key, "Discarding image for superseded request");
                return false;
            }
            state.memory_cache.put(key.clone(), image.clone());
        }

        debug!(slot = %target, key = %key, source = %source, "Image loaded successfully");
        let loaded = LoadedImage {
            key: key.clone(),
            image,
            source,
        };
        deliver(&pending.reply, target.clone(), key.clone(), Ok(loaded));
        true
    }

    async fn decode(&self, bytes: Vec<u8>) -> LoadResult<image::DynamicImage> {
        let max_alloc = self.config.max_decode_bytes;
        tokio::task::spawn_blocking(move || codec::decode(&bytes, max_alloc))
            .await
            .map_err(|e| LoadError::unexpected(format!("Decode task panicked: {e}")))?
    }

    /// Downloads, decodes, resizes, then transforms, in that order.
    async fn fetch_and_process(
        &self,
        request: Arc<dyn ImageRequest>,
    ) -> LoadResult<image::DynamicImage> {
        let bytes = self.fetcher.fetch(request.url()).await?;
        let max_alloc = self.config.max_decode_bytes;

        tokio::task::spawn_blocking(move || -> LoadResult<image::DynamicImage> {
            let decoded = codec::decode(&bytes, max_alloc)?;
            let resized = request.apply_resize(decoded);
            Ok(request.apply_transform(resized))
        })
        .await
        .map_err(|e| LoadError::unexpected(format!("Post-processing panicked: {e}")))?
    }

    /// Writes the image to the disk tier. Failures are logged and dropped.
    async fn persist(&self, key: &CacheKey, dir: &Path, image: Arc<image::DynamicImage>) {
        let encoded = tokio::task::spawn_blocking(move || codec::encode_png(&image))
            .await
            .map_err(|e| LoadError::unexpected(format!("Encode task panicked: {e}")))
            .and_then(|r| r);

        let result = match encoded {
            Ok(bytes) => self.disk_cache.store(key, dir, &bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
    }
}
