//! Pixel operations used by request post-processing.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

/// Scales an image to fit inside `width` x `height`, keeping its aspect ratio.
#[must_use]
pub fn resize_to_fit(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    image.resize(width, height, FilterType::Lanczos3)
}

/// Clears every pixel outside the largest circle centered in the image.
#[must_use]
pub fn mask_circle(image: &DynamicImage) -> DynamicImage {
    let mut rgba: RgbaImage = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;
    let radius = f64::from(w.min(h)) / 2.0;
    let radius_sq = radius * radius;

    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        if dx * dx + dy * dy > radius_sq {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    DynamicImage::ImageRgba8(rgba)
}

/// Converts to grayscale, preserving alpha.
#[must_use]
pub fn grayscale(image: &DynamicImage) -> DynamicImage {
    image.grayscale()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255])))
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let resized = resize_to_fit(&solid(200, 100), 50, 50);
        assert_eq!((resized.width(), resized.height()), (50, 25));
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let resized = resize_to_fit(&solid(32, 32), 32, 32);
        assert_eq!((resized.width(), resized.height()), (32, 32));
    }

    #[test]
    fn test_mask_circle_clears_corners() {
        let masked = mask_circle(&solid(20, 20)).to_rgba8();
        assert_eq!(masked.get_pixel(0, 0)[3], 0);
        assert_eq!(masked.get_pixel(19, 19)[3], 0);
        assert_eq!(masked.get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn test_grayscale_equal_channels() {
        let gray = grayscale(&solid(4, 4)).to_rgba8();
        let px = gray.get_pixel(1, 1);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }
}
