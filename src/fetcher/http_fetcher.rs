use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use reqwest::{header, redirect, Client, ClientBuilder};
use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use super::fetcher::ensure_fetchable;
use super::{FetchError, FetchOutcome, Fetcher};
use crate::core::ServiceConfig;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

#[derive(Debug, Error)]
pub enum HttpFetcherError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] header::InvalidHeaderValue),
    #[error("At least one user agent is required")]
    NoUserAgents,
}

/// reqwest-backed fetcher. Cloning shares the connection pool.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agents: Arc<Vec<header::HeaderValue>>,
    next_agent: Arc<AtomicUsize>,
    max_redirects: usize,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, HttpFetcherError> {
        Self::from_config(&ServiceConfig::default())
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, HttpFetcherError> {
        let user_agents = config
            .user_agents
            .iter()
            .map(|ua| header::HeaderValue::from_str(ua))
            .collect::<Result<Vec<_>, _>>()?;
        if user_agents.is_empty() {
            return Err(HttpFetcherError::NoUserAgents);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );

        let client = ClientBuilder::new()
            .default_headers(headers)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .connect_timeout(config.max_timeout)
            .build()?;

        Ok(Self {
            client,
            user_agents: Arc::new(user_agents),
            next_agent: Arc::new(AtomicUsize::new(0)),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn next_user_agent(&self) -> header::HeaderValue {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed);
        self.user_agents[index % self.user_agents.len()].clone()
    }

    fn categorize_error(&self, error: reqwest::Error, timeout: Duration) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(timeout)
        } else if error.is_redirect() {
            FetchError::TooManyRedirects(self.max_redirects)
        } else if error.is_builder() {
            FetchError::InvalidUrl(error.to_string())
        } else {
            let mut message = error.to_string();
            let mut source = error.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            FetchError::Network(message)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError> {
        ensure_fetchable(url)?;

        let timestamp = Utc::now();
        let started = Instant::now();
        let request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.next_user_agent())
            .timeout(timeout);

        // Dropping the exchange on expiry releases the connection.
        let exchange = async {
            let mut response = request
                .send()
                .await
                .map_err(|e| self.categorize_error(e, timeout))?;
            let status = response.status().as_u16();
            let final_url = response.url().clone();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if response
                .content_length()
                .is_some_and(|declared| declared > self.max_body_bytes as u64)
            {
                return Err(FetchError::BodyTooLarge(self.max_body_bytes));
            }

            let mut body = Vec::new();
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| self.categorize_error(e, timeout))?
            {
                if body.len() + chunk.len() > self.max_body_bytes {
                    return Err(FetchError::BodyTooLarge(self.max_body_bytes));
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, FetchError>((status, final_url, content_type, body))
        };

        let (status, final_url, content_type, body) =
            match tokio::time::timeout(timeout, exchange).await {
                Err(_) => return Err(FetchError::Timeout(timeout)),
                Ok(result) => result?,
            };

        let elapsed = started.elapsed();
        debug!(
            "Fetched {} -> {} (status={}, bytes={}, elapsed={:?})",
            url,
            final_url,
            status,
            body.len(),
            elapsed
        );
        trace!("Content-Type for {}: {:?}", final_url, content_type);

        Ok(FetchOutcome {
            url: url.clone(),
            final_url,
            status,
            content_type,
            body,
            elapsed,
            timestamp,
        })
    }
}
