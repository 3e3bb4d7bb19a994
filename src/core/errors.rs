use crate::fetcher::FetchError;
use crate::parser::{ExtractError, RuleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Upstream responded with HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error codes exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    UpstreamUnavailable,
    UnparseableContent,
    InternalFault,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorCode::UnparseableContent => "UnparseableContent",
            ErrorCode::InternalFault => "InternalFault",
        };
        f.write_str(name)
    }
}

impl ScrapeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ScrapeError::InvalidInput(_) | ScrapeError::InvalidRule(_) => ErrorCode::InvalidInput,
            ScrapeError::Fetch(FetchError::InvalidUrl(_)) => ErrorCode::InvalidInput,
            ScrapeError::Fetch(_) | ScrapeError::UpstreamStatus(_) => {
                ErrorCode::UpstreamUnavailable
            }
            ScrapeError::Extract(ExtractError::RuleApplication(_)) | ScrapeError::Internal(_) => {
                ErrorCode::InternalFault
            }
            ScrapeError::Extract(_) => ErrorCode::UnparseableContent,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ScrapeError::InvalidInput(_) | ScrapeError::InvalidRule(_) => 400,
            ScrapeError::Fetch(FetchError::InvalidUrl(_)) => 400,
            ScrapeError::Fetch(FetchError::Timeout(_)) => 504,
            ScrapeError::Fetch(_) | ScrapeError::UpstreamStatus(_) => 502,
            ScrapeError::Extract(ExtractError::RuleApplication(_)) | ScrapeError::Internal(_) => 500,
            ScrapeError::Extract(_) => 422,
        }
    }

    /// Upstream status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ScrapeError::UpstreamStatus(status) => Some(*status),
            _ => None,
        }
    }

    /// Message safe to show to clients. Internal faults never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            ScrapeError::Internal(_) | ScrapeError::Extract(ExtractError::RuleApplication(_)) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type ScrapeOutcome<T> = Result<T, ScrapeError>;
