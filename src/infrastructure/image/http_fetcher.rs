//! HTTP adapter for [`ImageFetcherPort`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ImageFetcherPort;

/// Default read timeout for image downloads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Downloads images with a plain GET, following redirects.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the given timeouts and redirect limit.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        read_timeout: Duration,
        connect_timeout: Duration,
        max_redirects: usize,
    ) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .read_timeout(read_timeout)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LoadError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcherPort for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, LoadError> {
        debug!(url = %url, "Downloading image from network");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::network(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::network(format!("Failed to read body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = HttpImageFetcher::new(DEFAULT_READ_TIMEOUT, Duration::from_secs(10), 10);
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fetcher =
            HttpImageFetcher::new(DEFAULT_READ_TIMEOUT, Duration::from_secs(2), 10).unwrap();
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/a.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Network { .. }));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        });

        let fetcher =
            HttpImageFetcher::new(DEFAULT_READ_TIMEOUT, Duration::from_secs(2), 10).unwrap();
        let err = fetcher.fetch(&format!("http://{addr}/missing.png")).await.unwrap_err();

        assert_eq!(err, LoadError::HttpStatus { status: 404 });
    }
}
