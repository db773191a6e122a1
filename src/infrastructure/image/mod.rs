//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with byte-weighted LRU eviction
//! - Disk caching with a TTL and a byte budget
//! - Latest-request-wins deduplication per display target
//! - A bounded worker pool and HTTP fetcher
//! - The async image loading pipeline

pub mod codec;
pub mod disk_cache;
pub mod http_fetcher;
pub mod loader;
pub mod memory_cache;
pub mod pending;
pub mod worker_pool;

pub use disk_cache::{DiskImageCache, DiskLookup};
pub use http_fetcher::HttpImageFetcher;
pub use loader::{ImageLoadedEvent, ImageLoader, ImageLoaderConfig};
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use pending::{Pending, PendingRequests, Stage};
pub use worker_pool::WorkerPool;
