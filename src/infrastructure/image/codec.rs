//! Image decode and persistence encode primitives.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, Limits};

use crate::domain::errors::{LoadError, LoadResult};

/// Decodes an image, refusing to allocate more than `max_alloc` bytes.
///
/// An image over the allocation bound is a decode error, which callers treat
/// the same as a cache miss rather than letting the allocation abort.
///
/// # Errors
/// Returns [`LoadError::Decode`] if the format is unknown, the data is
/// corrupt, or the image exceeds the allocation bound.
pub fn decode(bytes: &[u8], max_alloc: u64) -> LoadResult<DynamicImage> {
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::decode(format!("Failed to sniff format: {e}")))?;
    reader.limits(limits);
    reader
        .decode()
        .map_err(|e| LoadError::decode(format!("Failed to decode image: {e}")))
}

/// Encodes an image as PNG for the disk tier.
///
/// # Errors
/// Returns [`LoadError::Io`] if the pixel layout has no PNG encoding.
pub fn encode_png(image: &DynamicImage) -> LoadResult<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| LoadError::io(format!("Failed to encode PNG: {e}")))?;
    Ok(buf)
}
