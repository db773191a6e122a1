//! Fetch batch DTOs.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::entities::{ImageLoadRequest, LoadedImage, Transform};
use crate::domain::errors::LoadResult;

/// A batch of URLs to load with shared post-processing.
#[derive(Debug, Clone)]
pub struct FetchImagesRequest {
    /// URLs in output order.
    pub urls: Vec<String>,
    /// Disk cache directory shared by every request.
    pub cache_dir: PathBuf,
    /// Optional fit-inside box.
    pub resize: Option<(u32, u32)>,
    /// Transforms applied after resizing.
    pub transforms: Vec<Transform>,
    /// Where to write each loaded image as PNG, if anywhere.
    pub output_dir: Option<PathBuf>,
    /// How long to wait for the whole batch.
    pub timeout: Duration,
}

impl FetchImagesRequest {
    /// Creates a batch with no post-processing and no output directory.
    #[must_use]
    pub fn new(urls: Vec<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            urls,
            cache_dir: cache_dir.into(),
            resize: None,
            transforms: Vec::new(),
            output_dir: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Builds the loader request for the URL at `index` of batch `batch`.
    pub(crate) fn image_request(&self, batch: u64, index: usize) -> Option<ImageLoadRequest> {
        let url = self.urls.get(index)?;
        let mut request =
            ImageLoadRequest::new(Self::target_for(batch, index), url.as_str(), &self.cache_dir);
        if let Some((w, h)) = self.resize {
            request = request.resize(w, h);
        }
        for transform in &self.transforms {
            request = request.transform(*transform);
        }
        Some(request)
    }

    /// Display slot for the URL at `index`, unique per batch.
    #[must_use]
    pub fn target_for(batch: u64, index: usize) -> String {
        format!("batch-{batch}/{}", Self::file_stem(index))
    }

    /// Output file stem for the URL at `index`.
    #[must_use]
    pub fn file_stem(index: usize) -> String {
        format!("image-{index}")
    }
}

/// Outcome for one URL of the batch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Position of the URL in the request.
    pub index: usize,
    /// The URL that was loaded.
    pub url: String,
    /// The loaded image or why it failed.
    pub result: LoadResult<LoadedImage>,
    /// Where the image was written, if it was.
    pub output: Option<PathBuf>,
}

/// Outcomes of a batch, in request order.
#[derive(Debug, Default)]
pub struct FetchImagesResponse {
    /// One entry per requested URL.
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchImagesResponse {
    /// Number of URLs that loaded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of URLs that failed or timed out.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
