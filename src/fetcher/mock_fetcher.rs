use super::fetcher::ensure_fetchable;
use super::{FetchError, FetchOutcome, Fetcher};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

#[derive(Clone, Debug)]
pub enum MockResponse {
    Page {
        status: u16,
        body: String,
        content_type: Option<String>,
        delay: Option<Duration>,
    },
    Failure(FetchError),
}

impl MockResponse {
    pub fn html(body: &str) -> Self {
        Self::status(200, body).with_content_type("text/html; charset=utf-8")
    }

    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Page {
            status,
            body: body.to_string(),
            content_type: None,
            delay: None,
        }
    }

    pub fn with_content_type(self, value: &str) -> Self {
        match self {
            MockResponse::Page {
                status,
                body,
                delay,
                ..
            } => MockResponse::Page {
                status,
                body,
                content_type: Some(value.to_string()),
                delay,
            },
            failure => failure,
        }
    }

    pub fn with_delay(self, value: Duration) -> Self {
        match self {
            MockResponse::Page {
                status,
                body,
                content_type,
                ..
            } => MockResponse::Page {
                status,
                body,
                content_type,
                delay: Some(value),
            },
            failure => failure,
        }
    }
}

/// Scripted fetcher that cycles through its responses and counts calls.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Vec<MockResponse>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(responses),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        ensure_fetchable(url)?;

        if self.responses.is_empty() {
            return Err(FetchError::Network("no scripted response".to_string()));
        }

        match &self.responses[index % self.responses.len()] {
            MockResponse::Failure(error) => Err(error.clone()),
            MockResponse::Page {
                status,
                body,
                content_type,
                delay,
            } => {
                if let Some(delay) = delay {
                    if *delay > timeout {
                        sleep(timeout).await;
                        return Err(FetchError::Timeout(timeout));
                    }
                    sleep(*delay).await;
                }

                let mut outcome = FetchOutcome::new(url.clone(), *status, body.as_bytes());
                outcome.content_type = content_type.clone();
                Ok(outcome)
            }
        }
    }
}
