use crate::core::retry::RetryCategory;
use crate::http::ScrapeResult;
use chrono::{DateTime, Utc};
use log::info;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub start_time: DateTime<Utc>,
    pub total_scrapes: usize,
    pub successful_scrapes: usize,
    pub failed_scrapes: usize,
    pub upstream_requests: usize,
    pub retry_count: usize,
    pub bytes_downloaded: usize,
    pub status_codes: HashMap<u16, usize>,
    pub error_codes: HashMap<String, usize>,
    pub retry_reasons: HashMap<String, usize>,
    pub average_response_time: f64, // in milliseconds
}

/// Process-wide counters. Never consulted when building a result.
#[derive(Debug, Clone)]
pub struct StatsTracker {
    stats: Arc<RwLock<ServiceStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(ServiceStats {
                start_time: Utc::now(),
                total_scrapes: 0,
                successful_scrapes: 0,
                failed_scrapes: 0,
                upstream_requests: 0,
                retry_count: 0,
                bytes_downloaded: 0,
                status_codes: HashMap::new(),
                error_codes: HashMap::new(),
                retry_reasons: HashMap::new(),
                average_response_time: 0.0,
            })),
        }
    }

    /// One upstream exchange that produced a response.
    pub fn record_fetch(&self, status: u16, size: usize, elapsed: Duration) {
        let mut stats = self.stats.write();
        stats.upstream_requests += 1;
        *stats.status_codes.entry(status).or_insert(0) += 1;
        stats.bytes_downloaded += size;

        // Update average response time
        let current_total = stats.average_response_time * (stats.upstream_requests - 1) as f64;
        let new_duration = elapsed.as_secs_f64() * 1000.0;
        stats.average_response_time = (current_total + new_duration) / stats.upstream_requests as f64;
    }

    pub fn record_retry(&self, category: &RetryCategory) {
        let reason = match category {
            RetryCategory::Custom(name) => name.clone(),
            other => format!("{other:?}"),
        };
        let mut stats = self.stats.write();
        stats.retry_count += 1;
        *stats.retry_reasons.entry(reason).or_insert(0) += 1;
    }

    pub fn record_result(&self, result: &ScrapeResult) {
        let mut stats = self.stats.write();
        stats.total_scrapes += 1;
        match result.error {
            None => stats.successful_scrapes += 1,
            Some(code) => {
                stats.failed_scrapes += 1;
                *stats.error_codes.entry(code.to_string()).or_insert(0) += 1;
            }
        }
    }

    pub fn get_stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    pub fn log_summary(&self) {
        let stats = self.stats.read();
        let uptime = Utc::now().signed_duration_since(stats.start_time);

        info!(
            "Served {} scrapes in {}s ({} succeeded, {} failed)",
            stats.total_scrapes,
            uptime.num_seconds(),
            stats.successful_scrapes,
            stats.failed_scrapes
        );
        info!(
            "Upstream: {} requests, {} retries, {:.2} MB, {:.2}ms average",
            stats.upstream_requests,
            stats.retry_count,
            stats.bytes_downloaded as f64 / 1_000_000.0,
            stats.average_response_time
        );
        for (code, count) in &stats.status_codes {
            info!("  HTTP {}: {}", code, count);
        }
        for (code, count) in &stats.error_codes {
            info!("  {}: {}", code, count);
        }
        for (reason, count) in &stats.retry_reasons {
            info!("  retried for {}: {}", reason, count);
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
