//! Page fetching
//!
//! This module handles the fetch stage of the pipeline:
//! - Building an HTTP client with browser-style headers
//! - GET requests for bookmark URLs with a response size cap
//! - Classifying failures as transient, rate-limited, or permanent
//! - Readable-text extraction from fetched HTML
//!
//! Classification drives the retry layer: only [`ErrorKind::Transient`] and
//! [`ErrorKind::RateLimited`] failures are retried.

pub mod extract;

pub use extract::extract_text;

use crate::config::FetchConfig;
use crate::{StageError, StageResult};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Browser-style user agent; some sites serve stubs or 403s to obvious bots
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches raw page content for a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns the response body as text
    async fn fetch(&self, url: &str) -> StageResult<String>;
}

/// [`Fetcher`] backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
    max_size_bytes: u64,
}

impl HttpFetcher {
    /// Builds the fetcher from fetch configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Timeout, redirect, and size-cap settings
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Successfully built fetcher
    /// * `Err(reqwest::Error)` - Failed to build the underlying client
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(config.max_redirects as usize))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            max_size_bytes: config.max_size_mb as u64 * 1024 * 1024,
        })
    }

    fn classify_status(status: StatusCode) -> StageError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            StageError::rate_limited(format!("HTTP {status}"))
        } else if status.is_client_error() {
            StageError::permanent(format!("HTTP {status}"))
        } else {
            // 5xx and anything else unexpected gets another chance
            StageError::transient(format!("HTTP {status}"))
        }
    }

    fn classify_request_error(e: reqwest::Error) -> StageError {
        if e.is_timeout() {
            StageError::transient("Request timeout")
        } else if e.is_connect() {
            StageError::transient(format!("Connection failed: {e}"))
        } else if e.is_redirect() {
            StageError::permanent(format!("Redirect error: {e}"))
        } else {
            StageError::transient(e.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> StageResult<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| StageError::permanent(format!("Invalid URL: {e}")))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(StageError::permanent(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(Self::classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status));
        }

        // Reject oversized responses up front when the server declares a
        // length, and again after download for servers that do not.
        if let Some(len) = response.content_length() {
            if len > self.max_size_bytes {
                return Err(StageError::permanent(format!(
                    "Response too large: {len} bytes"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| StageError::transient(format!("Failed to read body: {e}")))?;

        if body.len() as u64 > self.max_size_bytes {
            return Err(StageError::permanent(format!(
                "Response too large: {} bytes",
                body.len()
            )));
        }

        tracing::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}
