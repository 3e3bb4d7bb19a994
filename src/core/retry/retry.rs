use crate::fetcher::FetchError;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ContentRetryCondition {
    pub pattern: String,
    pub is_regex: bool,
}

#[derive(Debug, Clone)]
pub enum RetryCondition {
    StatusCode(u16),
    Content(ContentRetryCondition),
    // Connection-level failures. Timeouts never match.
    NetworkError,
}

#[derive(Debug, Clone, Copy)]
pub enum BackoffPolicy {
    Constant,
    Linear,
    Exponential { factor: f32 },
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RetryCategory {
    RateLimit,      // 429, rate limiting messages
    ServerError,    // 500-599
    Network,        // refused, reset, DNS
    BotDetection,   // Bot detection, captchas
    Custom(String), // Custom category
}

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_policy: BackoffPolicy,
    pub conditions: Vec<RetryCondition>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_policy: BackoffPolicy::Exponential { factor: 2.0 },
            conditions: Vec::new(),
        }
    }
}

impl CategoryConfig {
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return std::cmp::min(self.initial_delay, self.max_delay);
        }

        let delay = match self.backoff_policy {
            BackoffPolicy::Constant => self.initial_delay,
            BackoffPolicy::Linear => self
                .initial_delay
                .saturating_mul(u32::try_from(attempt + 1).unwrap_or(u32::MAX)),
            BackoffPolicy::Exponential { factor } => {
                let scaled = self.initial_delay.as_nanos() as f64
                    * f64::from(factor).powi(attempt as i32);
                Duration::from_nanos(scaled as u64)
            }
        };

        std::cmp::min(delay, self.max_delay)
    }
}

/// Retry bookkeeping for a single scrape. Never shared between requests.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub counts: HashMap<RetryCategory, usize>,
    pub total_retries: usize,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryConfig {
    pub categories: HashMap<RetryCategory, CategoryConfig>,
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Rate limits, transient server errors and connection failures, each
    /// retried up to `max_retries` times with exponential back-off.
    pub fn standard(max_retries: usize, initial_delay: Duration) -> Self {
        let mut config = Self::default();
        if max_retries == 0 {
            return config;
        }

        let base = CategoryConfig {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(5),
            backoff_policy: BackoffPolicy::Exponential { factor: 2.0 },
            conditions: Vec::new(),
        };

        config.categories.insert(
            RetryCategory::RateLimit,
            CategoryConfig {
                conditions: vec![RetryCondition::StatusCode(429)],
                ..base.clone()
            },
        );
        config.categories.insert(
            RetryCategory::ServerError,
            CategoryConfig {
                conditions: [500, 502, 503, 504]
                    .into_iter()
                    .map(RetryCondition::StatusCode)
                    .collect(),
                ..base.clone()
            },
        );
        config.categories.insert(
            RetryCategory::Network,
            CategoryConfig {
                conditions: vec![RetryCondition::NetworkError],
                ..base
            },
        );
        config
    }

    pub fn with_category(mut self, category: RetryCategory, config: CategoryConfig) -> Self {
        self.categories.insert(category, config);
        self
    }

    pub fn should_retry_response(
        &self,
        state: &mut RetryState,
        status: u16,
        content: &str,
    ) -> Option<(RetryCategory, Duration)> {
        self.next_retry(state, |condition| match condition {
            RetryCondition::StatusCode(code) => *code == status,
            RetryCondition::Content(content_condition) => {
                check_content_condition(content_condition, content)
            }
            RetryCondition::NetworkError => false,
        })
    }

    pub fn should_retry_error(
        &self,
        state: &mut RetryState,
        error: &FetchError,
    ) -> Option<(RetryCategory, Duration)> {
        self.next_retry(state, |condition| {
            matches!(condition, RetryCondition::NetworkError)
                && matches!(error, FetchError::Network(_))
        })
    }

    fn next_retry<F>(&self, state: &mut RetryState, applies: F) -> Option<(RetryCategory, Duration)>
    where
        F: Fn(&RetryCondition) -> bool,
    {
        for (category, config) in &self.categories {
            let current_retries = state.counts.get(category).copied().unwrap_or(0);
            if current_retries >= config.max_retries {
                continue;
            }

            if config.conditions.iter().any(&applies) {
                state.counts.insert(category.clone(), current_retries + 1);
                state.total_retries += 1;
                let delay = config.calculate_delay(current_retries);
                return Some((category.clone(), delay));
            }
        }
        None
    }
}

fn check_content_condition(condition: &ContentRetryCondition, content: &str) -> bool {
    if condition.is_regex {
        Regex::new(&condition.pattern)
            .map(|re| re.is_match(content))
            .unwrap_or(false)
    } else {
        content
            .to_lowercase()
            .contains(&condition.pattern.to_lowercase())
    }
}
