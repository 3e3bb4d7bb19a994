use super::FetchOutcome;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// Retrieves a single URL. Implementations never retry on their own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError>;
}

/// Only absolute `http`/`https` URLs with a host can be fetched.
pub(crate) fn ensure_fetchable(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{other}' in {url}"
            )))
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(FetchError::InvalidUrl(format!("missing host in {url}"))),
    }
}
