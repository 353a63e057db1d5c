//! Network fetch: the only stage that touches HTTP.
//!
//! The rest of the pipeline talks to a [`Fetcher`], so tests can swap the
//! network for an in-memory map. [`HttpFetcher`] is the reqwest-backed
//! implementation used by the CLI.
//!
//! ## Retry Strategy
//!
//! Transient failures (transport errors, timeouts, HTTP 5xx/429) are retried
//! with exponential backoff: `retry_backoff_ms * 2^(attempt-1)`. Other HTTP
//! statuses fail on the first attempt.

use crate::config::ArchiveConfig;
use crate::document::RawPage;
use crate::error::FetchError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Fetch collaborator for pages and images.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET an article page and decode it as UTF-8.
    async fn fetch_page(&self, url: &str) -> Result<RawPage, FetchError>;

    /// GET the raw bytes of an image.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// reqwest-backed [`Fetcher`] with timeouts and bounded retry.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    page_timeout_secs: u64,
    image_timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl HttpFetcher {
    pub fn new(config: &ArchiveConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            page_timeout_secs: config.page_timeout_secs,
            image_timeout_secs: config.image_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    async fn get_once(
        &self,
        url: &str,
        timeout_secs: u64,
    ) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| classify(e, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        timeout_secs: u64,
    ) -> Result<reqwest::Response, FetchError> {
        with_retry(url, self.max_retries, self.retry_backoff_ms, move || {
            self.get_once(url, timeout_secs)
        })
        .await
    }
}

/// Run `attempt` until it succeeds, fails with a non-transient error, or
/// `max_retries` retries are used up.
///
/// The delay before retry `n` is `backoff_ms * 2^(n-1)`, saturating.
pub(crate) async fn with_retry<T, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retries < max_retries => {
                retries += 1;
                let backoff = backoff_delay(backoff_ms, retries);
                warn!(
                    "GET {}: {}, retry {}/{} after {}ms",
                    label, e, retries, max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(base_ms: u64, retry: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<RawPage, FetchError> {
        let response = self.get_with_retry(url, self.page_timeout_secs).await?;
        let final_url = response.url().to_string();
        let encoding = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(declared_charset);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(e, self.page_timeout_secs))?;
        debug!("Fetched page {} ({} bytes)", final_url, bytes.len());

        Ok(RawPage {
            url: final_url,
            text: String::from_utf8_lossy(&bytes).into_owned(),
            encoding,
        })
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get_with_retry(url, self.image_timeout_secs).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(e, self.image_timeout_secs))?;
        debug!("Fetched image {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}

fn classify(e: reqwest::Error, timeout_secs: u64) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { secs: timeout_secs }
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Pull `charset=…` out of a Content-Type header value.
fn declared_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    })
}
