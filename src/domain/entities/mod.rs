//! Domain entity definitions.

mod image;
mod image_request;

pub use image::{CacheKey, ImageSource, LoadedImage, TargetId};
pub use image_request::{ImageLoadRequest, Transform};
