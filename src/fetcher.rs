//! HTTP fetching with bounded retry over one shared client.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::utils::parse_header_lines;

/// Abstraction over "GET a URL and give me the body", enabling testability.
///
/// Implementations own their retry policy and must return [`Error::Cancelled`]
/// promptly once the token is cancelled.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the body of `url`
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Production [`Fetch`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build the client from the HTTP and retry sections of the config
    ///
    /// # Errors
    /// Returns an error if a header or the proxy address is malformed, or the
    /// client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in parse_header_lines(&config.http.headers) {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::config("http.headers", format!("bad header {key}: {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| Error::config("http.headers", format!("bad value for {key}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.http.timeout)
            .default_headers(headers);
        if let Some(proxy) = &config.http.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config("http.proxy", format!("bad proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    /// Wrap as a shared trait object
    pub fn into_shared(self) -> Arc<dyn Fetch> {
        Arc::new(self)
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = url, status = status.as_u16(), "Unexpected HTTP status");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        fetch_with_retry(&self.retry, cancel, || self.get_once(url)).await
    }
}
