use super::stages::{Stage, StageTracker};
use crate::core::retry::{RetryConfig, RetryState};
use crate::core::{ScrapeError, ServiceConfig};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::http::{Fields, RequestLimits, ScrapePayload, ScrapeRequest, ScrapeResult};
use crate::parser::{Extractor, HtmlExtractor, SiteSignals};
use crate::stats::StatsTracker;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;
use uuid::Uuid;

/// A finished scrape: the HTTP status to answer with and the body.
#[derive(Debug)]
pub struct ScrapeReply {
    pub status_code: u16,
    pub result: ScrapeResult,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteAnalysis {
    pub url: String,
    pub final_url: String,
    pub http_status: u16,
    #[serde(flatten)]
    pub signals: SiteSignals,
    pub timestamp: DateTime<Utc>,
}

/// Validates, fetches (with retries) and extracts one request at a time.
/// Holds no per-request state, so a single instance serves every caller.
#[derive(Clone)]
pub struct ScrapeHandler {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    retry_config: RetryConfig,
    limits: RequestLimits,
    stats: StatsTracker,
}

impl ScrapeHandler {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ServiceConfig, stats: StatsTracker) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(HtmlExtractor::new()),
            retry_config: config.retry_config.clone(),
            limits: RequestLimits::from(config),
            stats,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub async fn scrape(&self, payload: ScrapePayload) -> ScrapeReply {
        let id = Uuid::now_v7();
        let mut stages = StageTracker::new(id);
        let raw_url = payload.url.clone();
        let mut retries = 0;

        let outcome = self.run(id, payload, &mut stages, &mut retries).await;

        stages.advance(Stage::Responding);
        let (status_code, result) = match outcome {
            Ok((fetched, fields)) => {
                info!(
                    "[{}] Scraped {} ({} fields, HTTP {}, {:?})",
                    id,
                    fetched.final_url,
                    fields.len(),
                    fetched.status,
                    fetched.elapsed
                );
                (200, ScrapeResult::success(id, &fetched, fields, retries))
            }
            Err(error) => {
                warn!("[{}] Scrape of '{}' failed: {}", id, raw_url, error);
                let status_code = error.http_status();
                (status_code, ScrapeResult::failure(id, &raw_url, &error, retries))
            }
        };
        stages.advance(if result.is_success() {
            Stage::Completed
        } else {
            Stage::Failed
        });

        self.stats.record_result(&result);
        ScrapeReply {
            status_code,
            result,
            stages: stages.into_history(),
        }
    }

    async fn run(
        &self,
        id: Uuid,
        payload: ScrapePayload,
        stages: &mut StageTracker,
        retries: &mut usize,
    ) -> Result<(FetchOutcome, Fields), ScrapeError> {
        stages.advance(Stage::Validating);
        let request = ScrapeRequest::validate(id, payload, &self.limits)?;

        stages.advance(Stage::Fetching);
        info!("[{}] Fetching {} (timeout {:?})", id, request.url, request.timeout);
        let outcome = self
            .fetch_with_retry(&request.url, request.timeout, retries)
            .await?;

        stages.advance(Stage::Extracting);
        let fields = self.extractor.extract(&outcome, &request.plan)?;
        Ok((outcome, fields))
    }

    /// Samples a page and reports what kind of site it looks like.
    pub async fn analyze(&self, raw_url: &str) -> Result<SiteAnalysis, ScrapeError> {
        let id = Uuid::now_v7();
        let request = ScrapeRequest::validate(id, ScrapePayload::for_url(raw_url), &self.limits)?;

        info!("[{}] Analyzing {}", id, request.url);
        let mut retries = 0;
        let outcome = self
            .fetch_with_retry(&request.url, request.timeout, &mut retries)
            .await?;
        let signals = self.extractor.analyze(&outcome)?;

        Ok(SiteAnalysis {
            url: outcome.url.to_string(),
            final_url: outcome.final_url.to_string(),
            http_status: outcome.status,
            signals,
            timestamp: outcome.timestamp,
        })
    }

    async fn fetch_with_retry(
        &self,
        url: &Url,
        timeout: Duration,
        retries: &mut usize,
    ) -> Result<FetchOutcome, ScrapeError> {
        let mut state = RetryState::new();

        loop {
            let (category, delay) = match self.fetcher.fetch(url, timeout).await {
                Ok(outcome) => {
                    self.stats
                        .record_fetch(outcome.status, outcome.body.len(), outcome.elapsed);
                    let retry = self.retry_config.should_retry_response(
                        &mut state,
                        outcome.status,
                        &outcome.body_lossy(),
                    );
                    match retry {
                        Some(decision) => decision,
                        None if outcome.is_success() => return Ok(outcome),
                        None => return Err(ScrapeError::UpstreamStatus(outcome.status)),
                    }
                }
                Err(error) => match self.retry_config.should_retry_error(&mut state, &error) {
                    Some(decision) => decision,
                    None => {
                        debug!("No retry configuration matches error: {:?}", error);
                        return Err(error.into());
                    }
                },
            };

            *retries = state.total_retries;
            warn!(
                "Retrying request for URL: {} (category: {:?}, delay: {:?})",
                url, category, delay
            );
            self.stats.record_retry(&category);
            sleep(delay).await;
        }
    }
}
