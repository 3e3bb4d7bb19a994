use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

/// Raw result of one fetch, consumed by the extractor of the same request.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

impl FetchOutcome {
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status,
            content_type: None,
            body: body.into(),
            elapsed: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_final_url(mut self, final_url: Url) -> Self {
        self.final_url = final_url;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Lossy text view used for retry-condition matching.
    pub fn body_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
