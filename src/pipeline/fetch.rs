//! Image fetcher: URL → downloaded bytes → [`EncodedImage`].
//!
//! The embedder talks to an [`ImageSource`] rather than to reqwest directly,
//! so tests and library callers can plug in their own source (a cache, a
//! local directory, a fake). [`HttpImageSource`] is the real thing: one
//! streaming GET per URL with a timeout and a byte cap, then decoding and
//! resizing on the blocking pool.
//!
//! Every failure comes back as a [`FetchError`]; nothing here aborts a run.

use super::encode::{prepare_image, EncodedImage};
use crate::config::EmbedConfig;
use crate::error::{EmbedError, FetchError};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Something that can turn a URL into a ready-to-embed picture.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<EncodedImage, FetchError>> + Send;
}

/// Production [`ImageSource`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
    max_dimension: u32,
    quality: u8,
}

impl HttpImageSource {
    /// Build a client honouring the fetch timeout and user agent of `config`.
    pub fn new(config: &EmbedConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| EmbedError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
            max_bytes: config.max_download_bytes,
            max_dimension: config.max_image_dimension,
            quality: config.jpeg_quality,
        })
    }

    /// GET `url` and return the body, enforcing status, scheme and size rules.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = parse_http_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(e))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn request_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Request {
                detail: e.to_string(),
            }
        }
    }
}

impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, FetchError> {
        let bytes = self.download(url).await?;
        let (max_dimension, quality) = (self.max_dimension, self.quality);

        tokio::task::spawn_blocking(move || prepare_image(&bytes, max_dimension, quality))
            .await
            .map_err(|e| FetchError::Decode {
                detail: format!("decode task failed: {e}"),
            })?
    }
}

/// Accept only absolute `http`/`https` URLs.
fn parse_http_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let invalid = || FetchError::InvalidUrl {
        url: url.to_string(),
    };
    let parsed = reqwest::Url::parse(url.trim()).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_urls_only() {
        assert!(parse_http_url("https://example.com/a.jpg").is_ok());
        assert!(parse_http_url("  http://example.com/a.jpg ").is_ok());
        assert!(matches!(
            parse_http_url("ftp://example.com/a.jpg"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("file:///etc/passwd"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("12345"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_url_fails_without_network() {
        let source = HttpImageSource::new(&EmbedConfig::default()).unwrap();
        let err = tokio_test::block_on(source.download("not a url")).unwrap_err();
        assert_eq!(
            err,
            FetchError::InvalidUrl {
                url: "not a url".into()
            }
        );
    }
}
