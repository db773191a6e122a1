//! Image loading error types.

use thiserror::Error;

/// Result type for image loading operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Image loading error variants.
///
/// `Clone` so a failure can travel inside an [`ImageLoadedEvent`].
///
/// [`ImageLoadedEvent`]: crate::infrastructure::image::ImageLoadedEvent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum LoadError {
    #[error("invalid image request: {reason}")]
    InvalidRequest { reason: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("io error: {message}")]
    Io { message: String },

    #[error("unexpected error while loading image: {message}")]
    Unexpected { message: String },
}

impl LoadError {
    /// Creates invalid request error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates io error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates unexpected error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Returns true if this error ends a request with a user-visible failure.
    ///
    /// Invalid requests are rejected at submission and I/O errors are
    /// absorbed by the cache tiers, so neither is ever delivered as an event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Decode { .. } | Self::Unexpected { .. }
        )
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        Self::decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(LoadError::network("reset").is_terminal());
        assert!(LoadError::HttpStatus { status: 404 }.is_terminal());
        assert!(LoadError::decode("bad header").is_terminal());
        assert!(LoadError::unexpected("panic").is_terminal());
        assert!(!LoadError::invalid_request("empty url").is_terminal());
        assert!(!LoadError::io("disk full").is_terminal());
    }

    #[test]
    fn test_display() {
        let err = LoadError::HttpStatus { status: 503 };
        assert_eq!(err.to_string(), "unexpected HTTP status 503");
    }
}
