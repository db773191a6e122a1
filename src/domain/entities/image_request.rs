//! Concrete image request built by callers.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::domain::entities::TargetId;
use crate::domain::errors::LoadError;
use crate::domain::ports::{ImageRequest, check_request};
use crate::domain::services::image_ops;

/// Post-resize pixel transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Circular alpha mask, for avatars.
    Circle,
    /// Grayscale conversion.
    Grayscale,
}

impl Transform {
    fn apply(self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::Circle => image_ops::mask_circle(image),
            Self::Grayscale => image_ops::grayscale(image),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Grayscale => "gray",
        }
    }
}

/// A request to load `url` into the display slot `target`.
#[derive(Debug, Clone)]
pub struct ImageLoadRequest {
    target: TargetId,
    url: String,
    cache_dir: PathBuf,
    resize: Option<(u32, u32)>,
    transforms: Vec<Transform>,
}

impl ImageLoadRequest {
    /// Creates a request with no post-processing.
    #[must_use]
    pub fn new(
        target: impl Into<TargetId>,
        url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target: target.into(),
            url: url.into(),
            cache_dir: cache_dir.into(),
            resize: None,
            transforms: Vec::new(),
        }
    }

    /// Fits the decoded image inside `width` x `height`.
    #[must_use]
    pub const fn resize(mut self, width: u32, height: u32) -> Self {
        self.resize = Some((width, height));
        self
    }

    /// Appends a transform, applied after resizing.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Shorthand for [`Transform::Circle`].
    #[must_use]
    pub fn circle(self) -> Self {
        self.transform(Transform::Circle)
    }

    /// Requested resize box, if any.
    #[must_use]
    pub const fn resize_box(&self) -> Option<(u32, u32)> {
        self.resize
    }

    /// Transforms in application order.
    #[must_use]
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

impl ImageRequest for ImageLoadRequest {
    fn target(&self) -> &TargetId {
        &self.target
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn variant(&self) -> String {
        let mut variant = String::new();
        if let Some((w, h)) = self.resize {
            let _ = write!(variant, "resize={w}x{h};");
        }
        for transform in &self.transforms {
            variant.push_str(transform.name());
            variant.push(';');
        }
        variant
    }

    fn validate(&self) -> Result<(), LoadError> {
        if let Some((w, h)) = self.resize
            && (w == 0 || h == 0)
        {
            return Err(LoadError::invalid_request(format!(
                "resize box {w}x{h} has a zero side"
            )));
        }
        check_request(&self.target, &self.url, &self.cache_dir)
    }

    fn apply_resize(&self, image: DynamicImage) -> DynamicImage {
        match self.resize {
            Some((w, h)) => image_ops::resize_to_fit(&image, w, h),
            None => image,
        }
    }

    fn apply_transform(&self, image: DynamicImage) -> DynamicImage {
        self.transforms
            .iter()
            .fold(image, |img, transform| transform.apply(&img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const URL: &str = "https://example.com/avatar.png";

    #[test]
    fn test_variant_changes_key() {
        let plain = ImageLoadRequest::new("row-1", URL, "/tmp/cache");
        let sized = plain.clone().resize(64, 64);
        let round = sized.clone().circle();

        assert_ne!(plain.cache_key(), sized.cache_key());
        assert_ne!(sized.cache_key(), round.cache_key());
    }

    #[test]
    fn test_target_does_not_change_key() {
        let a = ImageLoadRequest::new("row-1", URL, "/tmp/cache");
        let b = ImageLoadRequest::new("row-2", URL, "/tmp/cache");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_validate_rejects_zero_resize() {
        let request = ImageLoadRequest::new("row-1", URL, "/tmp/cache").resize(0, 10);
        assert!(matches!(
            request.validate(),
            Err(LoadError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_plain_request() {
        let request = ImageLoadRequest::new("row-1", URL, "/tmp/cache")
            .resize(10, 10)
            .transform(Transform::Grayscale);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_post_processing_pipeline() {
        let request = ImageLoadRequest::new("row-1", URL, "/tmp/cache")
            .resize(8, 8)
            .circle();
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 255])));

        let out = request.apply_transform(request.apply_resize(source));

        assert_eq!((out.width(), out.height()), (8, 8));
        assert_eq!(out.to_rgba8().get_pixel(0, 0)[3], 0);
    }
}
