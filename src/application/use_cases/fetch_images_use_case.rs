//! Batch image fetch use case.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::dto::{FetchImagesRequest, FetchImagesResponse, FetchOutcome};
use crate::domain::entities::{LoadedImage, TargetId};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ImageRequest;
use crate::infrastructure::image::{ImageLoader, codec};

/// Loads a batch of URLs through the loader and optionally saves them.
///
/// Clones share the batch counter, so concurrent batches never reuse a
/// display slot and cannot supersede each other.
#[derive(Clone)]
pub struct FetchImagesUseCase {
    loader: ImageLoader,
    next_batch: Arc<AtomicU64>,
}

impl FetchImagesUseCase {
    /// Creates the use case over a shared loader.
    #[must_use]
    pub fn new(loader: ImageLoader) -> Self {
        Self {
            loader,
            next_batch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Submits every URL and waits for one outcome per URL.
    ///
    /// URLs still outstanding when `request.timeout` elapses get a
    /// [`LoadError::Network`] outcome.
    pub async fn execute(&self, request: FetchImagesRequest) -> FetchImagesResponse {
        let count = request.urls.len();
        let batch = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut results: Vec<Option<LoadResult<LoadedImage>>> = (0..count).map(|_| None).collect();
        let mut by_target: HashMap<TargetId, usize> = HashMap::with_capacity(count);

        for (index, slot) in results.iter_mut().enumerate() {
            let Some(image_request) = request.image_request(batch, index) else {
                continue;
            };
            let target = image_request.target().clone();
            match self.loader.submit_with(Arc::new(image_request), tx.clone()) {
                Ok(()) => {
                    by_target.insert(target, index);
                }
                Err(e) => {
                    warn!(url = %request.urls[index], error = %e, "Skipping invalid image URL");
                    *slot = Some(Err(e));
                }
            }
        }
        drop(tx);

        let mut waiting = by_target.len();
        let deadline = Instant::now() + request.timeout;
        while waiting > 0 {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => {
                    let Some(&index) = by_target.get(&event.target) else {
                        continue;
                    };
                    if results[index].is_none() {
                        debug!(batch, index, key = %event.key, ok = event.result.is_ok(), "Image settled");
                        results[index] = Some(event.result);
                        waiting -= 1;
                    }
                }
                // Every outstanding request was superseded elsewhere.
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = waiting, timeout = ?request.timeout, "Timed out waiting for images");
                    break;
                }
            }
        }

        let mut outcomes = Vec::with_capacity(count);
        for (index, (url, result)) in request.urls.iter().zip(results).enumerate() {
            let result = result.unwrap_or_else(|| {
                Err(LoadError::network(format!(
                    "no result within {}s",
                    request.timeout.as_secs_f32()
                )))
            });
            let output = match (&result, &request.output_dir) {
                (Ok(loaded), Some(dir)) => match write_output(dir, index, loaded).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Failed to write image");
                        None
                    }
                },
                _ => None,
            };
            outcomes.push(FetchOutcome {
                index,
                url: url.clone(),
                result,
                output,
            });
        }

        let response = FetchImagesResponse { outcomes };
        info!(
            batch,
            succeeded = response.succeeded(),
            failed = response.failed(),
            "Image batch finished"
        );
        response
    }
}

async fn write_output(dir: &Path, index: usize, loaded: &LoadedImage) -> LoadResult<PathBuf> {
    let image = loaded.image.clone();
    let bytes = tokio::task::spawn_blocking(move || codec::encode_png(&image))
        .await
        .map_err(|e| LoadError::unexpected(format!("Encode task failed: {e}")))??;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.png", FetchImagesRequest::file_stem(index)));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ImageSource, Transform};
    use crate::domain::ports::mocks::StubFetcher;
    use crate::infrastructure::image::{ImageLoaderConfig, codec};
    use bytes::Bytes;
    use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::runtime::Handle;
    use tokio::sync::Semaphore;
    use tokio_test::assert_ok;

    fn png(w: u32, h: u32) -> Bytes {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255])));
        Bytes::from(codec::encode_png(&image).unwrap())
    }

    fn use_case(fetcher: Arc<StubFetcher>) -> FetchImagesUseCase {
        let (tx, _rx) = mpsc::unbounded_channel();
        let loader = ImageLoader::new(ImageLoaderConfig::default(), &tx, fetcher, Handle::current());
        FetchImagesUseCase::new(loader)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_one_outcome_per_url_in_order() {
        let cache = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://img.test/a.png", Ok(png(10, 10)));
        fetcher.respond("https://img.test/c.png", Ok(png(4, 2)));
        let use_case = use_case(fetcher.clone());

        let request = FetchImagesRequest::new(
            vec![
                "https://img.test/a.png".to_string(),
                "https://img.test/missing.png".to_string(),
                "https://img.test/c.png".to_string(),
            ],
            cache.path(),
        );
        let response = use_case.execute(request).await;

        assert_eq!(response.outcomes.len(), 3);
        assert_eq!(response.succeeded(), 2);
        assert_eq!(response.failed(), 1);
        let first = assert_ok!(response.outcomes[0].result.as_ref());
        assert_eq!(first.source, ImageSource::Network);
        assert_eq!(
            response.outcomes[1].result.as_ref().unwrap_err(),
            &LoadError::HttpStatus { status: 404 }
        );
        let third = assert_ok!(response.outcomes[2].result.as_ref());
        assert_eq!((third.width(), third.height()), (4, 2));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_processed_png_outputs() {
        let cache = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://img.test/big.png", Ok(png(40, 20)));
        let use_case = use_case(fetcher);

        let mut request = FetchImagesRequest::new(vec!["https://img.test/big.png".to_string()], cache.path());
        request.resize = Some((10, 10));
        request.transforms = vec![Transform::Grayscale];
        request.output_dir = Some(out.path().join("nested"));
        let response = use_case.execute(request).await;

        let path = response.outcomes[0].output.clone().expect("output written");
        assert_eq!(path, out.path().join("nested").join("image-0.png"));
        let written = codec::decode(&std::fs::read(&path).unwrap(), u64::MAX).unwrap();
        assert_eq!(written.dimensions(), (10, 5));
        let Rgba([r, g, b, _]) = written.get_pixel(2, 2);
        assert_eq!((r, g), (g, b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_url_fails_without_fetching() {
        let cache = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let use_case = use_case(fetcher.clone());

        let request = FetchImagesRequest::new(vec!["ftp://img.test/a.png".to_string()], cache.path());
        let response = use_case.execute(request).await;

        assert!(matches!(
            response.outcomes[0].result,
            Err(LoadError::InvalidRequest { .. })
        ));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_reports_outstanding_urls() {
        let cache = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(StubFetcher::gated(gate.clone()));
        fetcher.respond("https://img.test/slow.png", Ok(png(2, 2)));
        let use_case = use_case(fetcher);

        let mut request = FetchImagesRequest::new(vec!["https://img.test/slow.png".to_string()], cache.path());
        request.timeout = Duration::from_millis(100);
        let response = use_case.execute(request).await;

        assert!(matches!(response.outcomes[0].result, Err(LoadError::Network { .. })));
        assert!(response.outcomes[0].output.is_none());
        gate.add_permits(1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_batches_keep_their_own_results() {
        let cache = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("https://img.test/left.png", Ok(png(3, 3)));
        fetcher.respond("https://img.test/right.png", Ok(png(5, 5)));
        let use_case = use_case(fetcher.clone());
        let other = use_case.clone();

        let mut left = FetchImagesRequest::new(vec!["https://img.test/left.png".to_string()], cache.path());
        left.timeout = Duration::from_secs(5);
        let mut right = FetchImagesRequest::new(vec!["https://img.test/right.png".to_string()], cache.path());
        right.timeout = Duration::from_secs(5);

        let (left, right) = tokio::join!(use_case.execute(left), other.execute(right));

        let left = assert_ok!(left.outcomes[0].result.as_ref());
        let right = assert_ok!(right.outcomes[0].result.as_ref());
        assert_eq!((left.width(), right.width()), (3, 5));
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_targets_differ_across_batches() {
        assert_ne!(
            FetchImagesRequest::target_for(0, 1),
            FetchImagesRequest::target_for(1, 1)
        );
        assert_eq!(FetchImagesRequest::file_stem(1), "image-1");
    }
}
