use crate::core::{ScrapeError, ServiceConfig};
use crate::fetcher::ensure_fetchable;
use crate::parser::{ExtractionPlan, RawRule, RuleSet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_PRODUCT_LIMIT: usize = 100;

/// Body of `POST /scrape` as received, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrapePayload {
    pub url: String,
    #[serde(default)]
    pub rules: Option<BTreeMap<String, RawRule>>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub product_limit: Option<usize>,
}

impl ScrapePayload {
    pub fn for_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            rules: None,
            timeout_ms: None,
            product_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub default_timeout: Duration,
    pub max_timeout: Duration,
}

impl From<&ServiceConfig> for RequestLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            default_timeout: config.default_timeout,
            max_timeout: config.max_timeout,
        }
    }
}

/// A validated scrape, immutable for the lifetime of the call.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub id: Uuid,
    pub url: Url,
    pub plan: ExtractionPlan,
    pub timeout: Duration,
}

impl ScrapeRequest {
    pub fn validate(
        id: Uuid,
        payload: ScrapePayload,
        limits: &RequestLimits,
    ) -> Result<Self, ScrapeError> {
        let url = parse_target_url(&payload.url)?;

        let timeout = match payload.timeout_ms {
            None => limits.default_timeout,
            Some(0) => {
                return Err(ScrapeError::InvalidInput(
                    "timeout_ms must be greater than zero".to_string(),
                ))
            }
            Some(ms) => {
                let timeout = Duration::from_millis(ms);
                if timeout > limits.max_timeout {
                    return Err(ScrapeError::InvalidInput(format!(
                        "timeout_ms must not exceed {}",
                        limits.max_timeout.as_millis()
                    )));
                }
                timeout
            }
        };

        if let Some(limit) = payload.product_limit {
            if limit == 0 || limit > MAX_PRODUCT_LIMIT {
                return Err(ScrapeError::InvalidInput(format!(
                    "product_limit must be between 1 and {MAX_PRODUCT_LIMIT}"
                )));
            }
        }

        let rules = match &payload.rules {
            Some(raw) => RuleSet::compile(raw)?,
            None => RuleSet::default(),
        };
        let plan = ExtractionPlan::new(rules, payload.product_limit)?;

        Ok(Self {
            id,
            url,
            plan,
            timeout,
        })
    }
}

fn parse_target_url(raw: &str) -> Result<Url, ScrapeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScrapeError::InvalidInput("url is required".to_string()));
    }
    if raw.len() > MAX_URL_LEN {
        return Err(ScrapeError::InvalidInput(format!(
            "url exceeds {MAX_URL_LEN} characters"
        )));
    }

    let url = Url::parse(raw).map_err(|e| {
        ScrapeError::InvalidInput(format!("'{raw}' is not an absolute URL: {e}"))
    })?;
    ensure_fetchable(&url)?;
    Ok(url)
}
