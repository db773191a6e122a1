//! Domain services.

/// Resize and pixel transforms.
pub mod image_ops;
