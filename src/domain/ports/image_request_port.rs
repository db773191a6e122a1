//! Port describing what the loader needs from a caller's request.

use std::path::Path;

use image::DynamicImage;

use crate::domain::entities::{CacheKey, TargetId};
use crate::domain::errors::LoadError;

/// Capability contract a request must provide to the image loader.
///
/// The loader holds a request only while it is pending and calls the
/// post-processing hooks from worker threads, in the order
/// [`apply_resize`](Self::apply_resize) then
/// [`apply_transform`](Self::apply_transform).
pub trait ImageRequest: Send + Sync + 'static {
    /// Display slot this request loads into.
    fn target(&self) -> &TargetId;

    /// Remote URL of the image.
    fn url(&self) -> &str;

    /// Directory holding this request's disk cache files.
    fn cache_dir(&self) -> &Path;

    /// Signature of the post-processing applied to the image.
    ///
    /// Folded into the cache key, so it must change whenever the output of
    /// the post-processing hooks would.
    fn variant(&self) -> String {
        String::new()
    }

    /// Key used in both cache tiers.
    fn cache_key(&self) -> CacheKey {
        CacheKey::derive(self.url(), &self.variant())
    }

    /// Pre-flight sanity check, run before any work is scheduled.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidRequest`] if the request cannot be served.
    fn validate(&self) -> Result<(), LoadError> {
        check_request(self.target(), self.url(), self.cache_dir())
    }

    /// Resizes a freshly decoded image.
    fn apply_resize(&self, image: DynamicImage) -> DynamicImage {
        image
    }

    /// Transforms an image already at its final dimensions.
    fn apply_transform(&self, image: DynamicImage) -> DynamicImage {
        image
    }
}

/// Baseline request checks: an absolute `http`/`https` URL, a non-empty
/// cache directory and a non-empty target.
///
/// # Errors
/// Returns [`LoadError::InvalidRequest`] naming the first failed check.
pub fn check_request(target: &TargetId, url: &str, cache_dir: &Path) -> Result<(), LoadError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| LoadError::invalid_request(format!("bad url {url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid_request(format!(
            "unsupported scheme {:?}",
            parsed.scheme()
        )));
    }
    if cache_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid_request("empty cache directory"));
    }
    if target.as_str().is_empty() {
        return Err(LoadError::invalid_request("empty target"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://example.com/a.png", "/tmp/c", "slot" => true ; "valid https")]
    #[test_case("http://example.com/a.png", "/tmp/c", "slot" => true ; "valid http")]
    #[test_case("ftp://example.com/a.png", "/tmp/c", "slot" => false ; "ftp scheme")]
    #[test_case("not a url", "/tmp/c", "slot" => false ; "unparseable")]
    #[test_case("https://example.com/a.png", "", "slot" => false ; "empty cache dir")]
    #[test_case("https://example.com/a.png", "/tmp/c", "" => false ; "empty target")]
    fn test_check_request(url: &str, dir: &str, target: &str) -> bool {
        check_request(&TargetId::new(target), url, Path::new(dir)).is_ok()
    }
}
