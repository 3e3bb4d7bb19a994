use super::{ExtractionPlan, SiteSignals};
use crate::fetcher::FetchOutcome;
use crate::http::Fields;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unparseable content: {0}")]
    ParseError(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Rule could not be applied: {0}")]
    RuleApplication(String),
}

/// Turns fetched content into fields. Implementations are synchronous: parsed
/// documents never outlive a single call.
pub trait Extractor: Send + Sync {
    fn extract(&self, outcome: &FetchOutcome, plan: &ExtractionPlan) -> Result<Fields, ExtractError>;

    fn analyze(&self, outcome: &FetchOutcome) -> Result<SiteSignals, ExtractError>;
}
