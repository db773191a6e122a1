//! imgloader - concurrent image loading with memory and disk caching.
//!
//! Images are served from an in-memory LRU, then from a per-directory disk
//! cache with a freshness window, then downloaded over HTTP. Requests are
//! keyed by display target; only the latest request for a target delivers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, fetchers and configuration.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imgloader";
