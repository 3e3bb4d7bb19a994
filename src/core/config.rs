use crate::core::retry::RetryConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
    pub user_agents: Vec<String>,
    pub retry_config: RetryConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: DEFAULT_MAX_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            retry_config: RetryConfig::standard(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY),
        }
    }
}

impl ServiceConfig {
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_user_agents(mut self, user_agents: Vec<&str>) -> Self {
        self.user_agents = user_agents.into_iter().map(String::from).collect();
        self
    }

    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = parse_var::<IpAddr>(&lookup, "SCRAPER_HOST")? {
            config.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "SCRAPER_TIMEOUT_MS")? {
            config.default_timeout = positive_millis("SCRAPER_TIMEOUT_MS", ms)?;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "SCRAPER_MAX_TIMEOUT_MS")? {
            config.max_timeout = positive_millis("SCRAPER_MAX_TIMEOUT_MS", ms)?;
        }
        if let Some(max_redirects) = parse_var::<usize>(&lookup, "SCRAPER_MAX_REDIRECTS")? {
            config.max_redirects = max_redirects;
        }
        if let Some(max_body_bytes) = parse_var::<usize>(&lookup, "SCRAPER_MAX_BODY_BYTES")? {
            if max_body_bytes == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "SCRAPER_MAX_BODY_BYTES",
                    value: max_body_bytes.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.max_body_bytes = max_body_bytes;
        }

        let max_retries =
            parse_var::<usize>(&lookup, "SCRAPER_MAX_RETRIES")?.unwrap_or(DEFAULT_MAX_RETRIES);
        let retry_delay = parse_var::<u64>(&lookup, "SCRAPER_RETRY_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        config.retry_config = RetryConfig::standard(max_retries, retry_delay);

        if let Some(user_agent) = lookup("SCRAPER_USER_AGENT") {
            let user_agent = user_agent.trim().to_string();
            if user_agent.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "SCRAPER_USER_AGENT",
                    value: user_agent,
                    reason: "must not be empty".to_string(),
                });
            }
            config.user_agents = vec![user_agent];
        }

        if config.default_timeout > config.max_timeout {
            return Err(ConfigError::InvalidValue {
                name: "SCRAPER_TIMEOUT_MS",
                value: config.default_timeout.as_millis().to_string(),
                reason: format!(
                    "exceeds maximum timeout of {}ms",
                    config.max_timeout.as_millis()
                ),
            });
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn positive_millis(name: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            value: ms.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}
